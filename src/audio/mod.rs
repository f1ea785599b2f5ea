//! Windows system volume access.
//!
//! The sync core sees the system volume through [`VolumeControl`] and receives
//! changes from a [`SystemAudioSource`]. The Windows implementations live in
//! [`endpoint`] and [`notifications`]; [`poller`] turns periodic readings into
//! change events.

#[cfg(windows)]
pub mod endpoint;
#[cfg(windows)]
pub mod notifications;
pub mod poller;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

pub use poller::{AudioPoller, VolumeWatcher};

/// Read/write access to the system master volume (0-100) and mute state.
pub trait VolumeControl {
    fn get_volume(&self) -> Result<u8, AudioError>;

    fn set_volume(&self, volume: u8) -> Result<(), AudioError>;

    fn get_mute(&self) -> Result<bool, AudioError>;
}

/// Change of the system volume or mute state, as seen by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAudioEvent {
    /// Master volume moved from `old` to `new` (0-100)
    VolumeChanged { old: u8, new: u8, at: Instant },

    /// Mute flipped
    MuteToggled { old: bool, new: bool },
}

/// Endpoint topology notifications from Windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A new audio device was connected
    DeviceAdded { device_id: String },

    /// An audio device was disconnected
    DeviceRemoved { device_id: String },

    /// Device state changed (active, disabled, not present, unplugged)
    DeviceStateChanged { device_id: String },

    /// Default playback device changed
    DefaultDeviceChanged { device_id: Option<String> },
}

/// Counter bumped on every endpoint topology change.
///
/// Volume controls compare it against the generation they resolved their
/// endpoint at, and re-resolve the default device when it moved.
#[derive(Debug, Clone, Default)]
pub struct TopologyGeneration(Arc<AtomicU64>);

impl TopologyGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives system audio events; returns `false` once nobody is listening.
pub type AudioEventSink = Box<dyn Fn(SystemAudioEvent) -> bool + Send>;

/// Producer of system volume/mute change events.
pub trait SystemAudioSource {
    /// Start delivering events to `sink`, sampling every `interval`.
    fn subscribe(
        &mut self,
        sink: AudioEventSink,
        interval: Duration,
    ) -> Result<AudioSubscription, AudioError>;
}

/// Handle to a running event subscription. Cancelled on drop.
pub struct AudioSubscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioSubscription {
    pub fn new(stop: Arc<AtomicBool>, handle: Option<JoinHandle<()>>) -> Self {
        Self { stop, handle }
    }

    /// Subscription with no background thread behind it.
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stop delivery and wait for the producer to finish.
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Audio service error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No default playback device available")]
    NoDefaultDevice,

    #[cfg(windows)]
    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(#[source] windows::core::Error),

    #[error("Volume control not available for device")]
    VolumeNotAvailable,

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[source] windows::core::Error),

    #[error("Audio poller failed to start: {0}")]
    PollerStart(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_generation() {
        let generation = TopologyGeneration::new();
        let shared = generation.clone();
        assert_eq!(generation.current(), 0);
        shared.bump();
        shared.bump();
        assert_eq!(generation.current(), 2);
    }

    #[test]
    fn test_detached_subscription_cancel() {
        let mut subscription = AudioSubscription::detached();
        assert!(!subscription.is_cancelled());
        subscription.cancel();
        assert!(subscription.is_cancelled());
    }
}
