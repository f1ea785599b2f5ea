//! Application settings snapshot.

use super::ConfigError;
use crate::mixer::ChannelId;
use crate::sync::gain::GainRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User-toggleable boolean settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    RememberVolume,
    ApplyVolumeFix,
    LimitGainToZero,
    RestartEngineOnDeviceChange,
    RestartEngineOnAppLaunch,
}

impl Toggle {
    pub const ALL: [Toggle; 5] = [
        Toggle::RememberVolume,
        Toggle::ApplyVolumeFix,
        Toggle::LimitGainToZero,
        Toggle::RestartEngineOnDeviceChange,
        Toggle::RestartEngineOnAppLaunch,
    ];

    /// Menu label.
    pub fn title(&self) -> &'static str {
        match self {
            Toggle::RememberVolume => "Remember Volume",
            Toggle::ApplyVolumeFix => "Apply Volume Fix (Driver Anomalies)",
            Toggle::LimitGainToZero => "Limit Gain to 0 dB",
            Toggle::RestartEngineOnDeviceChange => "Restart Audio Engine on Device Change",
            Toggle::RestartEngineOnAppLaunch => "Restart Audio Engine on Launch",
        }
    }
}

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// System volume polling interval in milliseconds
    pub polling_rate: u64,

    /// Engine gain applied at 0% system volume (dB)
    pub gain_min: f64,

    /// Engine gain applied at 100% system volume (dB)
    pub gain_max: f64,

    pub limit_db_gain_to_0: bool,
    pub remember_volume: bool,
    pub apply_volume_fix: bool,
    pub restart_audio_engine_on_device_change: bool,
    pub restart_audio_engine_on_app_launch: bool,

    /// Last remembered system volume (0-100)
    pub initial_volume: Option<u8>,

    /// Channels bound to the system volume
    pub bindings: Vec<ChannelId>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            polling_rate: 100,
            gain_min: -60.0,
            gain_max: 12.0,
            limit_db_gain_to_0: false,
            remember_volume: false,
            apply_volume_fix: true,
            restart_audio_engine_on_device_change: false,
            restart_audio_engine_on_app_launch: false,
            initial_volume: None,
            bindings: Vec::new(),
        }
    }
}

impl Settings {
    /// Check the settings once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_rate == 0 {
            return Err(ConfigError::InvalidPollingRate);
        }
        GainRange::new(self.gain_min, self.gain_max)?;
        Ok(())
    }

    /// Effective gain range, with the 0 dB cap applied when enabled.
    pub fn gain_range(&self) -> Result<GainRange, ConfigError> {
        let range = GainRange::new(self.gain_min, self.gain_max)?;
        if self.limit_db_gain_to_0 {
            Ok(range.capped_at(0.0))
        } else {
            Ok(range)
        }
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_rate)
    }

    pub fn toggle(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::RememberVolume => self.remember_volume,
            Toggle::ApplyVolumeFix => self.apply_volume_fix,
            Toggle::LimitGainToZero => self.limit_db_gain_to_0,
            Toggle::RestartEngineOnDeviceChange => self.restart_audio_engine_on_device_change,
            Toggle::RestartEngineOnAppLaunch => self.restart_audio_engine_on_app_launch,
        }
    }

    pub fn set_toggle(&mut self, toggle: Toggle, enabled: bool) {
        let slot = match toggle {
            Toggle::RememberVolume => &mut self.remember_volume,
            Toggle::ApplyVolumeFix => &mut self.apply_volume_fix,
            Toggle::LimitGainToZero => &mut self.limit_db_gain_to_0,
            Toggle::RestartEngineOnDeviceChange => &mut self.restart_audio_engine_on_device_change,
            Toggle::RestartEngineOnAppLaunch => &mut self.restart_audio_engine_on_app_launch,
        };
        *slot = enabled;
    }

    pub fn is_bound(&self, channel: ChannelId) -> bool {
        self.bindings.contains(&channel)
    }

    /// Add or remove a channel binding, keeping the list sorted and unique.
    pub fn set_bound(&mut self, channel: ChannelId, bound: bool) {
        self.bindings.retain(|c| *c != channel);
        if bound {
            self.bindings.push(channel);
            self.bindings.sort();
        }
    }
}
