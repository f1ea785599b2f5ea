//! Presentation layer boundary and the system tray.
//!
//! The sync engine never touches tray objects. It reports through
//! [`Presentation`]; [`ChannelPresentation`] forwards those calls as
//! [`UiCommand`]s to the UI thread, where the tray applies them.

pub mod menu;
#[cfg(windows)]
pub mod tray;

use crate::sync::bindings::BindingSnapshot;
use std::sync::mpsc::Sender;
use tracing::debug;

pub use menu::{MenuAction, MenuEntry};
#[cfg(windows)]
pub use tray::{TrayError, TrayManager};

/// Menu entries the engine can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuEntryId {
    /// "Bind Windows Volume To" submenu
    BindingMenu,
}

/// What the engine reports to the user-facing layer.
pub trait Presentation {
    /// A binding's label or visibility changed.
    fn notify_item_changed(&mut self, snapshot: &BindingSnapshot);

    fn enable_menu_entry(&mut self, id: MenuEntryId);

    /// Tear the presentation layer down; the process is about to exit.
    fn shutdown(&mut self);
}

/// Command applied on the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    ItemChanged(BindingSnapshot),
    EnableEntry(MenuEntryId),
    Shutdown,
}

/// [`Presentation`] that forwards to the UI thread over a channel.
pub struct ChannelPresentation {
    sender: Sender<UiCommand>,
}

impl ChannelPresentation {
    pub fn new(sender: Sender<UiCommand>) -> Self {
        Self { sender }
    }

    fn send(&self, command: UiCommand) {
        if self.sender.send(command).is_err() {
            debug!("UI thread gone, dropping command");
        }
    }
}

impl Presentation for ChannelPresentation {
    fn notify_item_changed(&mut self, snapshot: &BindingSnapshot) {
        self.send(UiCommand::ItemChanged(snapshot.clone()));
    }

    fn enable_menu_entry(&mut self, id: MenuEntryId) {
        self.send(UiCommand::EnableEntry(id));
    }

    fn shutdown(&mut self) {
        self.send(UiCommand::Shutdown);
    }
}
