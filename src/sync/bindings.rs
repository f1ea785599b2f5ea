//! Channel bindings and their engine-derived labels.

use crate::mixer::{ChannelId, ChannelKind, MixerClient, MixerVariant, Param};
use crate::ui::{MenuEntryId, Presentation};
use std::collections::BTreeMap;
use tracing::debug;

/// One engine channel exposed to the user as a bind target.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBinding {
    pub channel: ChannelId,

    /// Engine has reported metadata for this channel
    pub enabled: bool,

    /// User bound this channel to the system volume
    pub bound_to_system_volume: bool,

    pub display_label: String,

    pub device_name: Option<String>,

    /// Connected engine edition exposes this channel
    pub visible: bool,
}

impl ChannelBinding {
    pub fn new(channel: ChannelId, bound: bool) -> Self {
        let display_label = match channel.kind {
            ChannelKind::Strip => format!("Input Strip {}", channel.index),
            ChannelKind::Bus => format!("Output Bus {}", channel.index),
        };
        Self {
            channel,
            enabled: false,
            bound_to_system_volume: bound,
            display_label,
            device_name: None,
            visible: false,
        }
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        BindingSnapshot {
            channel: self.channel,
            label: self.display_label.clone(),
            visible: self.visible,
            enabled: self.enabled,
            bound: self.bound_to_system_volume,
        }
    }
}

/// Presentation-facing copy of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSnapshot {
    pub channel: ChannelId,
    pub label: String,
    pub visible: bool,
    pub enabled: bool,
    pub bound: bool,
}

/// Outcome of one label sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelSyncReport {
    /// Bindings whose label, visibility or enabled state changed
    pub changed: Vec<ChannelId>,

    /// The binding menu was enabled during this pass
    pub menu_enabled: bool,
}

/// Build the label shown for a channel.
pub fn display_label(label: &str, friendly_name: &str, device_name: Option<&str>) -> String {
    let base = if label.is_empty() { friendly_name } else { label };
    let text = match device_name {
        Some(device) => format!("{} : <{}>", base, device),
        None => base.to_string(),
    };
    text.trim().to_string()
}

/// The full set of bindings, one per possible channel.
#[derive(Debug)]
pub struct BindingSet {
    bindings: BTreeMap<ChannelId, ChannelBinding>,
    menu_enabled: bool,
}

impl BindingSet {
    /// Create every binding, bound according to `bound`.
    pub fn new(bound: &[ChannelId]) -> Self {
        let bindings = ChannelId::all()
            .map(|channel| (channel, ChannelBinding::new(channel, bound.contains(&channel))))
            .collect();
        Self {
            bindings,
            menu_enabled: false,
        }
    }

    pub fn get(&self, channel: ChannelId) -> Option<&ChannelBinding> {
        self.bindings.get(&channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelBinding> {
        self.bindings.values()
    }

    pub fn menu_enabled(&self) -> bool {
        self.menu_enabled
    }

    pub fn set_bound(&mut self, channel: ChannelId, bound: bool) {
        if let Some(binding) = self.bindings.get_mut(&channel) {
            binding.bound_to_system_volume = bound;
        }
    }

    /// Channels that receive system volume and mute, collected up front.
    pub fn propagation_targets(&self) -> Vec<ChannelId> {
        self.bindings
            .values()
            .filter(|b| b.visible && b.bound_to_system_volume)
            .map(|b| b.channel)
            .collect()
    }

    /// Refresh labels and visibility from the engine.
    pub fn sync_labels(
        &mut self,
        variant: MixerVariant,
        client: &dyn MixerClient,
        presentation: &mut dyn Presentation,
    ) -> LabelSyncReport {
        let mut report = LabelSyncReport::default();

        for binding in self.bindings.values_mut() {
            let previous_label = binding.display_label.clone();
            let previous_visible = binding.visible;
            let previous_enabled = binding.enabled;

            match variant.friendly_name(binding.channel) {
                None => binding.visible = false,
                Some(friendly_name) => {
                    binding.visible = true;

                    let label = match client.get_string(&Param::label(binding.channel)) {
                        Ok(label) => {
                            binding.enabled = true;
                            label
                        }
                        Err(e) => {
                            debug!("No label for {}: {}", binding.channel, e);
                            String::new()
                        }
                    };
                    binding.device_name = client
                        .get_string(&Param::device_name(binding.channel))
                        .ok()
                        .filter(|name| !name.trim().is_empty());

                    binding.display_label = display_label(
                        &label,
                        friendly_name,
                        binding.device_name.as_deref(),
                    );
                }
            }

            if binding.display_label != previous_label
                || binding.visible != previous_visible
                || binding.enabled != previous_enabled
            {
                report.changed.push(binding.channel);
                if binding.visible || previous_visible {
                    presentation.notify_item_changed(&binding.snapshot());
                }
            }
        }

        if !self.menu_enabled && self.bindings.values().any(|b| b.enabled) {
            self.menu_enabled = true;
            report.menu_enabled = true;
            presentation.enable_menu_entry(MenuEntryId::BindingMenu);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FakeMixer, PresentationLog, RecordingPresentation};

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("", "Hardware Input 1", None), "Hardware Input 1");
        assert_eq!(display_label("Mic", "Hardware Input 1", None), "Mic");
        assert_eq!(
            display_label("Mic", "Hardware Input 1", Some("USB Audio")),
            "Mic : <USB Audio>"
        );
        assert_eq!(display_label("Desk  ", "x", None), "Desk");
    }

    #[test]
    fn test_new_set_is_hidden_and_disabled() {
        let set = BindingSet::new(&[ChannelId::strip(0)]);
        assert_eq!(set.iter().count(), 16);
        assert!(set.iter().all(|b| !b.visible && !b.enabled));
        assert!(set.get(ChannelId::strip(0)).unwrap().bound_to_system_volume);
        assert!(set.propagation_targets().is_empty());
    }

    #[test]
    fn test_unexposed_indices_hidden_and_not_presented() {
        let mixer = FakeMixer::new(MixerVariant::Banana);
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);

        set.sync_labels(MixerVariant::Banana, &mixer, &mut presentation);

        for index in 5..=7 {
            let binding = set.get(ChannelId::strip(index)).unwrap();
            assert!(!binding.visible);
            assert!(!log.items().iter().any(|s| s.channel == ChannelId::strip(index)));
        }
        for index in 0..5 {
            assert!(set.get(ChannelId::strip(index)).unwrap().visible);
        }
        // 5 strips + 5 buses
        assert_eq!(log.items().len(), 10);
    }

    #[test]
    fn test_label_fallback_and_device_suffix() {
        let mixer = FakeMixer::new(MixerVariant::Basic)
            .with_label(ChannelId::strip(1), "Guitar")
            .with_device(ChannelId::strip(1), "Focusrite USB")
            .with_device(ChannelId::bus(0), "Speakers");
        let mut presentation = RecordingPresentation::new(PresentationLog::default());
        let mut set = BindingSet::new(&[]);

        set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        assert_eq!(
            set.get(ChannelId::strip(0)).unwrap().display_label,
            "Hardware Input 1"
        );
        assert_eq!(
            set.get(ChannelId::strip(1)).unwrap().display_label,
            "Guitar : <Focusrite USB>"
        );
        assert_eq!(
            set.get(ChannelId::bus(0)).unwrap().display_label,
            "Hardware Out A : <Speakers>"
        );
    }

    #[test]
    fn test_no_duplicate_notifications() {
        let mixer = FakeMixer::new(MixerVariant::Basic).with_label(ChannelId::strip(0), "Mic");
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);

        set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);
        let first = log.items().len();
        let report = set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        assert_eq!(first, 5);
        assert!(report.changed.is_empty());
        assert_eq!(log.items().len(), first);
    }

    #[test]
    fn test_label_change_notifies_once() {
        let mixer = FakeMixer::new(MixerVariant::Basic);
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);
        set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        mixer.set_label(ChannelId::bus(1), "Stream");
        let report = set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        assert_eq!(report.changed, vec![ChannelId::bus(1)]);
        assert_eq!(log.items().last().unwrap().label, "Stream");
    }

    #[test]
    fn test_menu_enabled_once() {
        let mixer = FakeMixer::new(MixerVariant::Potato);
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);

        let first = set.sync_labels(MixerVariant::Potato, &mixer, &mut presentation);
        let second = set.sync_labels(MixerVariant::Potato, &mixer, &mut presentation);

        assert!(first.menu_enabled);
        assert!(!second.menu_enabled);
        assert!(set.menu_enabled());
        assert_eq!(log.enabled_entries(), vec![MenuEntryId::BindingMenu]);
    }

    #[test]
    fn test_failed_reads_keep_binding_disabled() {
        let mixer = FakeMixer::new(MixerVariant::Basic).failing_reads();
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);

        let report = set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        let binding = set.get(ChannelId::strip(2)).unwrap();
        assert!(binding.visible);
        assert!(!binding.enabled);
        assert_eq!(binding.display_label, "Voicemeeter Input");
        assert!(!report.menu_enabled);
        assert!(log.enabled_entries().is_empty());
    }

    #[test]
    fn test_recovered_reads_enable_binding() {
        let mixer = FakeMixer::new(MixerVariant::Basic).failing_reads();
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[]);
        set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);
        let first = log.items().len();

        mixer.set_failing_reads(false);
        let report = set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);

        // same label as before, only the enabled state moved
        assert_eq!(report.changed.len(), 5);
        assert_eq!(log.items().len(), first + 5);
        assert!(log.items()[first..].iter().all(|s| s.enabled && s.visible));
        assert!(report.menu_enabled);
    }

    #[test]
    fn test_variant_downgrade_hides_channels() {
        let mixer = FakeMixer::new(MixerVariant::Potato);
        let log = PresentationLog::default();
        let mut presentation = RecordingPresentation::new(log.clone());
        let mut set = BindingSet::new(&[ChannelId::bus(6)]);

        set.sync_labels(MixerVariant::Potato, &mixer, &mut presentation);
        assert_eq!(set.propagation_targets(), vec![ChannelId::bus(6)]);

        set.sync_labels(MixerVariant::Basic, &mixer, &mut presentation);
        assert!(set.propagation_targets().is_empty());
        let last = log.items().into_iter().rev().find(|s| s.channel == ChannelId::bus(6));
        assert!(!last.unwrap().visible);
    }
}
