//! Driver anomaly suppression.
//!
//! Some drivers snap the system volume to 100% when playback devices are
//! swapped or the audio engine resets. A jump to 100% that arrives at least a
//! second after the previous accepted change is treated as one of those and
//! reverted; moving a slider up to 100% produces a stream of closely spaced
//! samples and is never flagged.

use crate::audio::VolumeControl;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Minimum quiet time before a jump to 100% counts as suspect.
pub const ANOMALY_MIN_GAP: Duration = Duration::from_millis(1000);

const MAX_VOLUME: u8 = 100;

/// One system volume reading, consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSample {
    pub value: u8,
    pub muted_transition: Option<bool>,
    pub at: Instant,
}

impl VolumeSample {
    pub fn new(value: u8, at: Instant) -> Self {
        Self {
            value: value.min(MAX_VOLUME),
            muted_transition: None,
            at,
        }
    }
}

/// Last known good volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyMemory {
    pub last_accepted_volume: Option<u8>,
    pub last_accepted_at: Instant,
}

/// Settings the filter consults per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    pub fix_enabled: bool,
    pub initial_volume: Option<u8>,
}

/// Result of filtering one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The sample is the new system volume.
    Accepted(u8),

    /// The sample was an anomaly; the system volume was set back to `restored`.
    Corrected { rejected: u8, restored: u8 },
}

impl FilterOutcome {
    pub fn accepted(&self) -> Option<u8> {
        match self {
            FilterOutcome::Accepted(volume) => Some(*volume),
            FilterOutcome::Corrected { .. } => None,
        }
    }
}

/// Stateful anomaly filter over [`AnomalyMemory`].
#[derive(Debug)]
pub struct AnomalyFilter {
    memory: AnomalyMemory,
}

impl AnomalyFilter {
    pub fn new(now: Instant) -> Self {
        Self {
            memory: AnomalyMemory {
                last_accepted_volume: None,
                last_accepted_at: now,
            },
        }
    }

    pub fn memory(&self) -> AnomalyMemory {
        self.memory
    }

    fn is_suspect(&self, sample: &VolumeSample, policy: FilterPolicy) -> Option<u8> {
        if sample.value != MAX_VOLUME || !policy.fix_enabled {
            return None;
        }
        if policy.initial_volume == Some(MAX_VOLUME) {
            return None;
        }
        let gap = sample.at.saturating_duration_since(self.memory.last_accepted_at);
        if gap < ANOMALY_MIN_GAP {
            return None;
        }
        self.memory
            .last_accepted_volume
            .filter(|&last| last != MAX_VOLUME)
    }

    /// Filter one sample, reverting the system volume if it is an anomaly.
    ///
    /// A corrected sample leaves the memory untouched; the echo of the
    /// corrective write arrives as an ordinary sample and is accepted then.
    pub fn accept(
        &mut self,
        sample: VolumeSample,
        policy: FilterPolicy,
        control: &dyn VolumeControl,
    ) -> FilterOutcome {
        if let Some(restore) = self.is_suspect(&sample, policy) {
            info!(
                "Driver anomaly detected: volume reached {}% from {}%, reverting",
                sample.value, restore
            );
            if let Err(e) = control.set_volume(restore) {
                warn!("Failed to revert system volume to {}%: {}", restore, e);
            }
            return FilterOutcome::Corrected {
                rejected: sample.value,
                restored: restore,
            };
        }

        self.memory.last_accepted_volume = Some(sample.value);
        self.memory.last_accepted_at = sample.at;
        FilterOutcome::Accepted(sample.value)
    }

    /// The application itself is about to change the system volume.
    pub fn note_external_write(&mut self, at: Instant) {
        self.memory.last_accepted_at = at;
    }
}
