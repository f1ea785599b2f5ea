//! Core sync state and per-event handling.

use super::anomaly::{AnomalyFilter, FilterOutcome, FilterPolicy, VolumeSample};
use super::bindings::BindingSet;
use super::gain::to_gain;
use crate::audio::{DeviceEvent, VolumeControl};
use crate::config::{Settings, SettingsStore, Toggle};
use crate::mixer::{ChannelId, MixerClient, Param, ParamName};
use crate::ui::{MenuAction, Presentation};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Quiet time after the last device notification before the engine restarts.
pub const RESTART_DEBOUNCE: Duration = Duration::from_secs(1);

/// Everything the sync loop mutates, owned by one thread.
pub struct SyncEngine<M, V, S, P> {
    mixer: Option<M>,
    volume: V,
    settings: S,
    presentation: P,
    filter: AnomalyFilter,
    bindings: BindingSet,
    restart_due: Option<Instant>,
}

impl<M, V, S, P> SyncEngine<M, V, S, P>
where
    M: MixerClient,
    V: VolumeControl,
    S: SettingsStore,
    P: Presentation,
{
    pub fn new(volume: V, settings: S, presentation: P, now: Instant) -> Self {
        let bindings = BindingSet::new(&settings.get().bindings);
        Self {
            mixer: None,
            volume,
            settings,
            presentation,
            filter: AnomalyFilter::new(now),
            bindings,
            restart_due: None,
        }
    }

    /// Hand over a ready engine connection.
    pub fn attach(&mut self, mixer: M) {
        self.mixer = Some(mixer);
    }

    pub fn is_attached(&self) -> bool {
        self.mixer.is_some()
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }

    /// Write `value` to `name` on every bound, visible channel.
    ///
    /// Returns the channels that were written successfully.
    fn apply_to_targets(&mut self, name: ParamName, value: f32) -> Vec<ChannelId> {
        let Some(mixer) = self.mixer.as_mut() else {
            debug!("Not connected, dropping {} update", name.as_str());
            return Vec::new();
        };

        let mut written = Vec::new();
        for channel in self.bindings.propagation_targets() {
            let param = Param::Channel(channel, name);
            match mixer.set_float(&param, value) {
                Ok(()) => written.push(channel),
                Err(e) => warn!("Failed to set {}: {}", param, e),
            }
        }
        written
    }

    /// Filter a system volume change and propagate it as gain.
    pub fn handle_volume_change(&mut self, volume: u8, at: Instant) -> FilterOutcome {
        let settings = self.settings.get();
        let policy = FilterPolicy {
            fix_enabled: settings.apply_volume_fix,
            initial_volume: settings.initial_volume,
        };

        let outcome = self
            .filter
            .accept(VolumeSample::new(volume, at), policy, &self.volume);
        let Some(accepted) = outcome.accepted() else {
            return outcome;
        };

        match settings.gain_range() {
            Ok(range) => {
                let gain = to_gain(accepted, range);
                let written = self.apply_to_targets(ParamName::Gain, gain as f32);
                debug!(
                    "System volume {}% -> {:.1} dB on {} channel(s)",
                    accepted,
                    gain,
                    written.len()
                );
            }
            Err(e) => warn!("Skipping gain update: {}", e),
        }

        if settings.remember_volume && settings.initial_volume != Some(accepted) {
            self.remember_volume(settings, accepted);
        }

        outcome
    }

    /// Mirror the system mute state onto the bound channels.
    pub fn handle_mute_toggle(&mut self, muted: bool) {
        let value = if muted { 1.0 } else { 0.0 };
        let written = self.apply_to_targets(ParamName::Mute, value);
        debug!("System mute {} on {} channel(s)", muted, written.len());
    }

    /// Poll the engine for parameter changes, relabelling on change.
    pub fn poll_mixer(&mut self) -> bool {
        let Some(mixer) = self.mixer.as_mut() else {
            return false;
        };
        match mixer.poll_changed() {
            Ok(true) => {
                debug!("Voicemeeter parameters changed");
                self.handle_mixer_change();
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!("Change poll failed: {}", e);
                false
            }
        }
    }

    /// Refresh binding labels from the engine.
    pub fn handle_mixer_change(&mut self) {
        let Some(mixer) = self.mixer.as_ref() else {
            return;
        };
        match mixer.variant() {
            Ok(variant) => {
                let report = self
                    .bindings
                    .sync_labels(variant, mixer, &mut self.presentation);
                if !report.changed.is_empty() {
                    debug!("Relabelled {} binding(s)", report.changed.len());
                }
            }
            Err(e) => warn!("Skipping label sync: {}", e),
        }
    }

    /// Put the remembered volume back and push it to the bound channels.
    /// Runs once when syncing starts, after the first label sync.
    pub fn restore_initial_volume(&mut self, now: Instant) -> Option<u8> {
        let settings = self.settings.get();
        if !settings.remember_volume {
            return None;
        }
        let volume = settings.initial_volume?;

        self.filter.note_external_write(now);
        match self.volume.set_volume(volume) {
            Ok(()) => {
                info!("Restored system volume to {}%", volume);
                // The poller may read after the write and see no change.
                self.handle_volume_change(volume, now);
                Some(volume)
            }
            Err(e) => {
                warn!("Failed to restore system volume: {}", e);
                None
            }
        }
    }

    /// Apply a menu click. Returns false when the user asked to exit.
    pub fn handle_menu_action(&mut self, action: MenuAction) -> bool {
        match action {
            MenuAction::SetBinding { channel, bound } => {
                info!("Binding {} = {}", channel, bound);
                self.bindings.set_bound(channel, bound);
                let mut settings = self.settings.get();
                settings.set_bound(channel, bound);
                self.store(settings);
            }
            MenuAction::SetToggle { toggle, enabled } => {
                info!("{} = {}", toggle.title(), enabled);
                let mut settings = self.settings.get();
                settings.set_toggle(toggle, enabled);
                if toggle == Toggle::RememberVolume && enabled {
                    match self.volume.get_volume() {
                        Ok(volume) => settings.initial_volume = Some(volume),
                        Err(e) => warn!("Failed to read system volume: {}", e),
                    }
                }
                self.store(settings);
            }
            MenuAction::ShowMixer => self.send_command(ParamName::Show),
            MenuAction::RestartAudioEngine => self.restart_audio_engine(),
            MenuAction::Exit => return false,
        }
        true
    }

    /// Windows reported an endpoint change.
    pub fn handle_device_change(&mut self, event: &DeviceEvent, now: Instant) {
        debug!("Audio device change: {:?}", event);
        if self.settings.get().restart_audio_engine_on_device_change {
            self.restart_due = Some(now + RESTART_DEBOUNCE);
        }
    }

    /// Restart the audio engine once the device-change burst has settled.
    pub fn poll_due_restart(&mut self, now: Instant) -> bool {
        match self.restart_due {
            Some(due) if now >= due => {
                self.restart_due = None;
                self.restart_audio_engine();
                true
            }
            _ => false,
        }
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_due.is_some()
    }

    pub fn restart_audio_engine(&mut self) {
        info!("Restarting Voicemeeter audio engine");
        self.send_command(ParamName::Restart);
    }

    fn send_command(&mut self, name: ParamName) {
        let Some(mixer) = self.mixer.as_mut() else {
            warn!("Not connected, ignoring Command.{}", name.as_str());
            return;
        };
        let param = Param::Command(name);
        if let Err(e) = mixer.set_float(&param, 1.0) {
            warn!("Failed to send {}: {}", param, e);
        }
    }

    fn remember_volume(&mut self, mut settings: Settings, volume: u8) {
        settings.initial_volume = Some(volume);
        debug!("Remembering system volume {}%", volume);
        self.store(settings);
    }

    fn store(&mut self, settings: Settings) {
        self.settings.set(settings);
        if let Err(e) = self.settings.persist() {
            warn!("Failed to save settings: {}", e);
        }
    }

    /// Release the engine and tear the presentation down.
    pub fn terminate(&mut self) {
        self.restart_due = None;
        if let Some(mut mixer) = self.mixer.take() {
            mixer.disconnect();
            debug!("Released Voicemeeter connection");
        }
        self.presentation.shutdown();
    }
}
