//! Configuration: the settings snapshot and its persistence.

pub mod persistence;
pub mod settings;

pub use persistence::{JsonSettingsStore, SettingsStore};
pub use settings::{Settings, Toggle};

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid gain range: gain_min {min} dB, gain_max {max} dB")]
    InvalidGainRange { min: f64, max: f64 },

    #[error("Polling rate must be greater than zero")]
    InvalidPollingRate,
}
