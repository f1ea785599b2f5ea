//! Windows Registry access.
//!
//! "Start with Windows" lives in the per-user Run key; the Voicemeeter install
//! directory is read from the engine's uninstall entry.

use std::path::{Path, PathBuf};
use thiserror::Error;
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_32KEY, KEY_WRITE, REG_SAM_FLAGS,
    REG_SZ,
};

const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
const RUN_VALUE: &str = "VoicemeeterWindowsVolume";
const VOICEMEETER_UNINSTALL_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Uninstall\VB:Voicemeeter {17359A74-1236-5467}";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to open registry key {0}")]
    OpenFailed(&'static str),

    #[error("Failed to update Run entry: {0}")]
    WriteFailed(String),
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Open registry key, closed on drop.
struct RegKey(HKEY);

impl RegKey {
    fn open(root: HKEY, path: &str, access: REG_SAM_FLAGS) -> Option<Self> {
        let path = to_wide(path);
        let mut hkey = HKEY::default();
        let result =
            unsafe { RegOpenKeyExW(root, PCWSTR::from_raw(path.as_ptr()), 0, access, &mut hkey) };
        result.is_ok().then_some(Self(hkey))
    }

    /// Size in bytes of a value, `None` if it is missing.
    fn value_size(&self, name: &[u16]) -> Option<u32> {
        let mut size = 0u32;
        let result = unsafe {
            RegQueryValueExW(self.0, PCWSTR::from_raw(name.as_ptr()), None, None, None, Some(&mut size))
        };
        result.is_ok().then_some(size)
    }

    fn read_string(&self, name: &str) -> Option<String> {
        let name = to_wide(name);
        let mut size = self.value_size(&name).filter(|&size| size > 0)?;
        let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
        let result = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR::from_raw(name.as_ptr()),
                None,
                None,
                Some(buffer.as_mut_ptr() as *mut u8),
                Some(&mut size),
            )
        };
        if result.is_err() {
            return None;
        }
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        Some(String::from_utf16_lossy(&buffer[..len]))
    }

    fn write_string(&self, name: &str, value: &str) -> windows::core::Result<()> {
        let name = to_wide(name);
        let data: Vec<u8> = to_wide(value).iter().flat_map(|c| c.to_le_bytes()).collect();
        unsafe { RegSetValueExW(self.0, PCWSTR::from_raw(name.as_ptr()), 0, REG_SZ, Some(&data)) }
            .ok()
    }

    fn delete_value(&self, name: &str) -> windows::core::Result<()> {
        let name = to_wide(name);
        unsafe { RegDeleteValueW(self.0, PCWSTR::from_raw(name.as_ptr())) }.ok()
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

/// The per-user Run entry that starts the app at logon.
#[derive(Debug, Default)]
pub struct StartupEntry;

impl StartupEntry {
    pub fn new() -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        RegKey::open(HKEY_CURRENT_USER, RUN_KEY, KEY_READ)
            .and_then(|key| key.value_size(&to_wide(RUN_VALUE)))
            .is_some_and(|size| size > 0)
    }

    /// Point the Run entry at this executable, or remove it.
    ///
    /// Removing an entry that does not exist succeeds.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), RegistryError> {
        let key = RegKey::open(HKEY_CURRENT_USER, RUN_KEY, KEY_WRITE)
            .ok_or(RegistryError::OpenFailed(RUN_KEY))?;

        if !enabled {
            let _ = key.delete_value(RUN_VALUE);
            return Ok(());
        }

        let exe = std::env::current_exe().map_err(|e| RegistryError::WriteFailed(e.to_string()))?;
        key.write_string(RUN_VALUE, &startup_command(&exe))
            .map_err(|e| RegistryError::WriteFailed(e.to_string()))
    }
}

/// Run entry command line: the quoted executable path.
fn startup_command(exe: &Path) -> String {
    format!("\"{}\"", exe.display())
}

/// Directory holding the uninstaller named by an `UninstallString` value.
fn install_dir_from_uninstall(uninstall: &str) -> Option<PathBuf> {
    let uninstall = uninstall.trim().trim_matches('"');
    if uninstall.is_empty() {
        return None;
    }
    Path::new(uninstall).parent().map(Path::to_path_buf)
}

/// Directory Voicemeeter is installed in. The installer is 32-bit, so its
/// uninstall entry lives in the WOW64 view.
pub fn voicemeeter_install_dir() -> Option<PathBuf> {
    let key = RegKey::open(HKEY_LOCAL_MACHINE, VOICEMEETER_UNINSTALL_KEY, KEY_READ | KEY_WOW64_32KEY)?;
    install_dir_from_uninstall(&key.read_string("UninstallString")?)
}
