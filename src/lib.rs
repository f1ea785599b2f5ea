//! Voicemeeter Windows Volume - Library
//!
//! A system tray utility that keeps the Windows system volume in sync with
//! Voicemeeter strips and buses.
//!
//! ## Features
//!
//! - Map the system volume (0-100) onto a configurable dB gain range
//! - Mirror the system mute state onto bound channels
//! - Revert spurious jumps to 100% caused by driver anomalies
//! - Relabel channels from Voicemeeter's own labels and device names
//! - Remember the last volume across restarts
//! - Restart the Voicemeeter audio engine on launch or on device changes
//! - Start with Windows option

#[cfg(windows)]
pub mod app;
pub mod audio;
pub mod config;
pub mod mixer;
pub mod platform;
pub mod sync;
pub mod ui;

#[cfg(windows)]
pub use app::App;
pub use audio::{AudioError, DeviceEvent, SystemAudioEvent, VolumeControl};
pub use config::{ConfigError, JsonSettingsStore, Settings, SettingsStore, Toggle};
pub use mixer::{ChannelId, ChannelKind, MixerClient, MixerConnector, MixerError, MixerVariant};
pub use sync::{EngineEvent, SyncEngine, SyncError, SyncLoop};
pub use ui::{ChannelPresentation, MenuAction, Presentation, UiCommand};
