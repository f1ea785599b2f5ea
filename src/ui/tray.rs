//! System tray icon management.
//!
//! Builds the tray menu, keeps the `MenuId -> MenuEntry` dispatch table and
//! applies [`UiCommand`]s from the engine. Lives on the UI thread only.

use super::menu::{BindingRows, RowChange};
use super::{MenuEntry, MenuEntryId, UiCommand};
use crate::config::{Settings, Toggle};
use crate::mixer::ChannelId;
use crate::platform::icons::create_app_icon;
use crate::sync::bindings::{BindingSnapshot, ChannelBinding};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    TrayIcon, TrayIconBuilder,
};

const TOOLTIP: &str = "Voicemeeter Windows Volume";

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to load icon resource: {0}")]
    IconLoadFailed(String),

    #[error("Tray icon not initialized")]
    NotInitialized,

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

fn menu_err(e: tray_icon::menu::Error) -> TrayError {
    TrayError::MenuFailed(e.to_string())
}

/// A menu click resolved through the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuClick {
    pub entry: MenuEntry,

    /// Checked state after the click, for checkbox entries
    pub checked: bool,
}

/// System tray manager.
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    entries: HashMap<MenuId, MenuEntry>,
    check_items: HashMap<MenuId, CheckMenuItem>,
    binding_items: HashMap<ChannelId, CheckMenuItem>,
    binding_rows: BindingRows,
    binding_menu: Option<Submenu>,
    startup_item: Option<CheckMenuItem>,
}

impl TrayManager {
    pub fn new() -> Self {
        Self {
            tray_icon: None,
            entries: HashMap::new(),
            check_items: HashMap::new(),
            binding_items: HashMap::new(),
            binding_rows: BindingRows::new(),
            binding_menu: None,
            startup_item: None,
        }
    }

    /// Create and show the tray icon with its menu.
    pub fn create(&mut self, settings: &Settings, start_with_windows: bool) -> Result<(), TrayError> {
        let icon = create_app_icon().map_err(TrayError::IconLoadFailed)?;
        let menu = Menu::new();

        let title = MenuItem::new(TOOLTIP, false, None);
        menu.append(&title).map_err(menu_err)?;
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;

        // Rows are inserted once the connected edition is known.
        let bindings = Submenu::new("Bind Windows Volume To", false);
        bindings.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
        for channel in ChannelId::all() {
            let binding = ChannelBinding::new(channel, settings.is_bound(channel));
            let item = CheckMenuItem::new(
                &binding.display_label,
                true,
                binding.bound_to_system_volume,
                None,
            );
            self.register_check(&item, MenuEntry::Binding(channel));
            self.binding_items.insert(channel, item);
        }
        menu.append(&bindings).map_err(menu_err)?;

        let toggles = Submenu::new("Settings", true);
        for toggle in Toggle::ALL {
            let item = CheckMenuItem::new(toggle.title(), true, settings.toggle(toggle), None);
            toggles.append(&item).map_err(menu_err)?;
            self.register_check(&item, MenuEntry::Setting(toggle));
        }
        menu.append(&toggles).map_err(menu_err)?;
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;

        self.append_item(&menu, "Show Voicemeeter", MenuEntry::ShowMixer)?;
        self.append_item(&menu, "Restart Audio Engine", MenuEntry::RestartAudioEngine)?;

        let startup_item = CheckMenuItem::new("Start with Windows", true, start_with_windows, None);
        menu.append(&startup_item).map_err(menu_err)?;
        self.register_check(&startup_item, MenuEntry::StartWithWindows);
        self.startup_item = Some(startup_item);

        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
        self.append_item(&menu, "Exit", MenuEntry::Exit)?;

        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_tooltip(TOOLTIP)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        self.binding_menu = Some(bindings);
        self.tray_icon = Some(tray_icon);
        Ok(())
    }

    fn register_check(&mut self, item: &CheckMenuItem, entry: MenuEntry) {
        self.entries.insert(item.id().clone(), entry);
        self.check_items.insert(item.id().clone(), item.clone());
    }

    fn append_item(&mut self, menu: &Menu, text: &str, entry: MenuEntry) -> Result<(), TrayError> {
        let item = MenuItem::new(text, true, None);
        menu.append(&item).map_err(menu_err)?;
        self.entries.insert(item.id().clone(), entry);
        Ok(())
    }

    /// Next menu click, if any. Call this from the event loop.
    pub fn next_click(&self) -> Option<MenuClick> {
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            let Some(entry) = self.entries.get(&event.id) else {
                continue;
            };
            let checked = self
                .check_items
                .get(&event.id)
                .map(|item| item.is_checked())
                .unwrap_or(false);
            return Some(MenuClick {
                entry: *entry,
                checked,
            });
        }
        None
    }

    /// Apply a command from the engine. Returns false on shutdown.
    pub fn apply(&mut self, command: &UiCommand) -> bool {
        match command {
            UiCommand::ItemChanged(snapshot) => {
                self.update_binding(snapshot);
                true
            }
            UiCommand::EnableEntry(MenuEntryId::BindingMenu) => {
                if let Some(menu) = &self.binding_menu {
                    menu.set_enabled(true);
                }
                true
            }
            UiCommand::Shutdown => {
                self.destroy();
                false
            }
        }
    }

    fn update_binding(&mut self, snapshot: &BindingSnapshot) {
        let (Some(item), Some(menu)) = (
            self.binding_items.get(&snapshot.channel),
            self.binding_menu.as_ref(),
        ) else {
            return;
        };
        debug!("Tray label {} = {:?}", snapshot.channel, snapshot.label);
        item.set_text(&snapshot.label);
        item.set_enabled(snapshot.enabled);
        item.set_checked(snapshot.bound);

        let result = match self.binding_rows.set_visible(snapshot.channel, snapshot.visible) {
            RowChange::Insert(position) => menu.insert(item, position),
            RowChange::Remove => menu.remove(item),
            RowChange::Unchanged => Ok(()),
        };
        if let Err(e) = result {
            warn!("Failed to update tray row for {}: {}", snapshot.channel, e);
        }
    }

    /// Update the "Start with Windows" menu item checkmark.
    pub fn set_startup_checked(&mut self, checked: bool) -> Result<(), TrayError> {
        let item = self.startup_item.as_ref().ok_or(TrayError::NotInitialized)?;
        item.set_checked(checked);
        Ok(())
    }

    /// Remove the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
    }
}

impl Default for TrayManager {
    fn default() -> Self {
        Self::new()
    }
}
