//! Tray menu vocabulary.
//!
//! [`MenuEntry`] identifies what a tray item is; the tray keeps a
//! `MenuId -> MenuEntry` dispatch table. Clicking an entry produces a
//! [`MenuAction`] for the engine, or is handled on the UI thread.

use crate::config::Toggle;
use crate::mixer::{ChannelId, ChannelKind};
use std::collections::BTreeSet;

/// What a tray item stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuEntry {
    Binding(ChannelId),
    Setting(Toggle),
    ShowMixer,
    RestartAudioEngine,
    StartWithWindows,
    Exit,
}

/// Request sent to the sync engine from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SetBinding { channel: ChannelId, bound: bool },
    SetToggle { toggle: Toggle, enabled: bool },
    ShowMixer,
    RestartAudioEngine,
    Exit,
}

impl MenuEntry {
    /// Engine action for a click, given the item's checked state afterwards.
    ///
    /// `None` for entries handled on the UI thread.
    pub fn action(&self, checked: bool) -> Option<MenuAction> {
        match *self {
            MenuEntry::Binding(channel) => Some(MenuAction::SetBinding {
                channel,
                bound: checked,
            }),
            MenuEntry::Setting(toggle) => Some(MenuAction::SetToggle {
                toggle,
                enabled: checked,
            }),
            MenuEntry::ShowMixer => Some(MenuAction::ShowMixer),
            MenuEntry::RestartAudioEngine => Some(MenuAction::RestartAudioEngine),
            MenuEntry::Exit => Some(MenuAction::Exit),
            MenuEntry::StartWithWindows => None,
        }
    }
}

/// How a binding row must change in the bindings submenu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert(usize),
    Remove,
    Unchanged,
}

/// Which binding rows are in the bindings submenu.
///
/// Rows are ordered strips first, then a separator, then buses. Hidden
/// channels have no row at all.
#[derive(Debug, Default)]
pub struct BindingRows {
    shown: BTreeSet<ChannelId>,
}

impl BindingRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shown(&self, channel: ChannelId) -> bool {
        self.shown.contains(&channel)
    }

    /// Record the channel's visibility and say what to do with its row.
    pub fn set_visible(&mut self, channel: ChannelId, visible: bool) -> RowChange {
        if visible == self.is_shown(channel) {
            return RowChange::Unchanged;
        }
        if !visible {
            self.shown.remove(&channel);
            return RowChange::Remove;
        }

        let before = self.shown.range(..channel).count();
        let separator = usize::from(channel.kind == ChannelKind::Bus);
        self.shown.insert(channel);
        RowChange::Insert(before + separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_start_empty_and_insert_in_order() {
        let mut rows = BindingRows::new();
        assert!(!rows.is_shown(ChannelId::strip(0)));

        assert_eq!(rows.set_visible(ChannelId::strip(2), true), RowChange::Insert(0));
        assert_eq!(rows.set_visible(ChannelId::strip(0), true), RowChange::Insert(0));
        // separator sits after the strips
        assert_eq!(rows.set_visible(ChannelId::bus(1), true), RowChange::Insert(3));
        assert_eq!(rows.set_visible(ChannelId::bus(0), true), RowChange::Insert(3));
        assert_eq!(rows.set_visible(ChannelId::strip(1), true), RowChange::Insert(1));
        assert_eq!(rows.set_visible(ChannelId::bus(1), true), RowChange::Unchanged);
    }

    #[test]
    fn test_hidden_rows_are_removed() {
        let mut rows = BindingRows::new();
        for index in 0..5 {
            rows.set_visible(ChannelId::strip(index), true);
            rows.set_visible(ChannelId::bus(index), true);
        }

        // Banana to Basic: strips 3-4 and buses 2-4 go away
        for index in 3..5 {
            assert_eq!(rows.set_visible(ChannelId::strip(index), false), RowChange::Remove);
        }
        for index in 2..5 {
            assert_eq!(rows.set_visible(ChannelId::bus(index), false), RowChange::Remove);
        }
        assert_eq!(rows.set_visible(ChannelId::bus(4), false), RowChange::Unchanged);
        assert!(!rows.is_shown(ChannelId::strip(3)));
        assert!(rows.is_shown(ChannelId::bus(1)));

        assert_eq!(rows.set_visible(ChannelId::bus(2), true), RowChange::Insert(6));
    }

    #[test]
    fn test_entry_actions() {
        assert_eq!(
            MenuEntry::Binding(ChannelId::bus(2)).action(true),
            Some(MenuAction::SetBinding {
                channel: ChannelId::bus(2),
                bound: true
            })
        );
        assert_eq!(
            MenuEntry::Setting(Toggle::RememberVolume).action(false),
            Some(MenuAction::SetToggle {
                toggle: Toggle::RememberVolume,
                enabled: false
            })
        );
        assert_eq!(MenuEntry::StartWithWindows.action(true), None);
        assert_eq!(MenuEntry::Exit.action(false), Some(MenuAction::Exit));
    }
}
