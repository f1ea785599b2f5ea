//! Running process lookup.

use regex::Regex;
use thiserror::Error;

/// Process lookup error types.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to snapshot process list: {0}")]
    Snapshot(String),

    #[error("Invalid process pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Executable name matcher with an exclusion keyword.
#[derive(Debug, Clone)]
pub struct ProcessPattern {
    include: Regex,
    exclude: &'static str,
}

impl ProcessPattern {
    pub fn new(include: &str, exclude: &'static str) -> Result<Self, ProcessError> {
        Ok(Self {
            include: Regex::new(include)?,
            exclude,
        })
    }

    /// Any Voicemeeter edition's engine executable, but not its installer.
    pub fn voicemeeter() -> Self {
        Self {
            include: Regex::new(r"(?i)^voicemeeter[\w\- ]*\.exe$")
                .expect("static pattern is valid"),
            exclude: "setup",
        }
    }

    pub fn matches(&self, exe_name: &str) -> bool {
        self.include.is_match(exe_name) && !exe_name.to_ascii_lowercase().contains(self.exclude)
    }
}

/// Finds running processes by executable name.
pub trait ProcessFinder {
    /// PID of the first running process matching `pattern`.
    fn find_running(&self, pattern: &ProcessPattern) -> Result<Option<u32>, ProcessError>;
}

/// ToolHelp snapshot based process finder.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolhelpProcessFinder;

#[cfg(windows)]
impl ProcessFinder for ToolhelpProcessFinder {
    fn find_running(&self, pattern: &ProcessPattern) -> Result<Option<u32>, ProcessError> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
            TH32CS_SNAPPROCESS,
        };

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| ProcessError::Snapshot(e.to_string()))?;

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut found = None;
            let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
            while more {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let name = String::from_utf16_lossy(&entry.szExeFile[..len]);
                if pattern.matches(&name) {
                    found = Some(entry.th32ProcessID);
                    break;
                }
                more = Process32NextW(snapshot, &mut entry).is_ok();
            }

            let _ = CloseHandle(snapshot);
            Ok(found)
        }
    }
}
