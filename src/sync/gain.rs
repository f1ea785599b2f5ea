//! System volume (0-100) to engine gain (dB) conversion.

use crate::config::ConfigError;

/// Validated `[min, max]` gain range in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    min: f64,
    max: f64,
}

impl GainRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(ConfigError::InvalidGainRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Lower the maximum to `ceiling`, never below the minimum.
    pub fn capped_at(self, ceiling: f64) -> Self {
        Self {
            min: self.min,
            max: self.max.min(ceiling).max(self.min),
        }
    }
}

/// Map a system volume to engine gain, rounded to 0.1 dB (half away from zero).
///
/// The result never leaves `range`, even when the bounds are not multiples of 0.1.
pub fn to_gain(volume: u8, range: GainRange) -> f64 {
    let volume = f64::from(volume.min(100));
    let gain = volume * (range.max - range.min) / 100.0 + range.min;
    ((gain * 10.0).round() / 10.0).clamp(range.min, range.max)
}
