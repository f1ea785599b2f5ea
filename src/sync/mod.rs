//! Synchronization core: the system volume to Voicemeeter gain/mute bridge.
//!
//! Everything here is platform independent. Windows and the mixing engine are
//! reached through the traits in [`crate::audio`], [`crate::mixer`] and
//! [`crate::platform`].

pub mod anomaly;
pub mod bindings;
pub mod clock;
pub mod connection;
pub mod engine;
pub mod gain;
pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

use crate::audio::AudioError;
use crate::config::ConfigError;
use crate::mixer::MixerError;
use thiserror::Error;

pub use anomaly::{AnomalyFilter, FilterOutcome, FilterPolicy, VolumeSample};
pub use bindings::{BindingSet, BindingSnapshot, ChannelBinding};
pub use clock::{CancelToken, Clock, SystemClock};
pub use connection::{ConnectTiming, ConnectionManager, ConnectionState, QuiescenceTracker};
pub use engine::SyncEngine;
pub use gain::{to_gain, GainRange};
pub use runner::{EngineEvent, LoopState, SyncLoop};

/// Sync core error types.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Voicemeeter connection failed: {0}")]
    Connect(#[from] MixerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("System audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Cancelled")]
    Cancelled,
}
