//! UI-thread application state.
//!
//! Owns the tray, turns menu clicks into engine events and applies the
//! engine's presentation commands.

use crate::config::Settings;
use crate::platform::StartupEntry;
use crate::sync::{CancelToken, EngineEvent};
use crate::ui::menu::MenuEntry;
use crate::ui::tray::{MenuClick, TrayError, TrayManager};
use crate::ui::{MenuAction, UiCommand};
use std::sync::mpsc::Sender;
use tracing::{debug, error, info};

/// Main application state.
pub struct App {
    tray: TrayManager,
    engine: Sender<EngineEvent>,
    cancel: CancelToken,
    startup: StartupEntry,

    /// Whether the application should exit
    should_exit: bool,
}

impl App {
    /// Create the tray and wire it to the engine thread.
    pub fn new(
        settings: &Settings,
        engine: Sender<EngineEvent>,
        cancel: CancelToken,
    ) -> Result<Self, TrayError> {
        let startup = StartupEntry::new();
        let start_with_windows = startup.is_enabled();

        let mut tray = TrayManager::new();
        tray.create(settings, start_with_windows)?;

        Ok(Self {
            tray,
            engine,
            cancel,
            startup,
            should_exit: false,
        })
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Drain pending tray clicks.
    pub fn process_tray_events(&mut self) {
        while let Some(click) = self.tray.next_click() {
            self.handle_click(click);
        }
    }

    fn handle_click(&mut self, click: MenuClick) {
        if click.entry == MenuEntry::StartWithWindows {
            self.set_start_with_windows(click.checked);
            return;
        }

        let Some(action) = click.entry.action(click.checked) else {
            return;
        };
        if action == MenuAction::Exit {
            info!("Exit requested from tray");
            // The engine may still be waiting for Voicemeeter.
            self.cancel.cancel();
        }
        if self.engine.send(EngineEvent::Menu(action)).is_err() {
            debug!("Engine thread gone, exiting");
            self.should_exit = true;
        }
    }

    fn set_start_with_windows(&mut self, enabled: bool) {
        match self.startup.set_enabled(enabled) {
            Ok(()) => info!("Start with Windows = {}", enabled),
            Err(e) => {
                error!("Failed to update startup setting: {}", e);
                let _ = self.tray.set_startup_checked(self.startup.is_enabled());
            }
        }
    }

    /// Apply a command from the engine thread.
    pub fn apply(&mut self, command: UiCommand) {
        if !self.tray.apply(&command) {
            self.should_exit = true;
        }
    }

    /// Remove the tray icon.
    pub fn shutdown(&mut self) {
        self.tray.destroy();
        self.should_exit = true;
    }
}
