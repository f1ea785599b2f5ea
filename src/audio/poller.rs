//! Polling-based system volume change detection.

use super::{
    AudioError, AudioEventSink, AudioSubscription, SystemAudioEvent, SystemAudioSource,
    VolumeControl,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Turns successive volume/mute readings into change events.
#[derive(Debug, Default)]
pub struct VolumeWatcher {
    last_volume: Option<u8>,
    last_muted: Option<bool>,
}

impl VolumeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading. The first reading only primes the watcher.
    pub fn observe(&mut self, volume: u8, muted: bool, at: Instant) -> Vec<SystemAudioEvent> {
        let mut events = Vec::new();

        if let Some(old) = self.last_volume {
            if old != volume {
                events.push(SystemAudioEvent::VolumeChanged {
                    old,
                    new: volume,
                    at,
                });
            }
        }
        if let Some(old) = self.last_muted {
            if old != muted {
                events.push(SystemAudioEvent::MuteToggled { old, new: muted });
            }
        }

        self.last_volume = Some(volume);
        self.last_muted = Some(muted);
        events
    }
}

/// Tracks runs of failed reads so only the first one is logged as an error.
#[derive(Debug, Default)]
struct ReadFailures {
    failing: bool,
}

impl ReadFailures {
    /// Record a failure. True when it starts a new run.
    fn failed(&mut self) -> bool {
        !std::mem::replace(&mut self.failing, true)
    }

    /// Record a success. True when it ends a run.
    fn recovered(&mut self) -> bool {
        std::mem::replace(&mut self.failing, false)
    }
}

/// Polls a [`VolumeControl`] on a dedicated thread.
///
/// The control is built on the polling thread by `make_control`, so it may
/// hold thread-affine handles (COM interfaces).
pub struct AudioPoller<F> {
    make_control: F,
}

impl<F, V> AudioPoller<F>
where
    F: Fn() -> Result<V, AudioError> + Clone + Send + 'static,
    V: VolumeControl,
{
    pub fn new(make_control: F) -> Self {
        Self { make_control }
    }
}

impl<F, V> SystemAudioSource for AudioPoller<F>
where
    F: Fn() -> Result<V, AudioError> + Clone + Send + 'static,
    V: VolumeControl,
{
    fn subscribe(
        &mut self,
        sink: AudioEventSink,
        interval: Duration,
    ) -> Result<AudioSubscription, AudioError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let make_control = self.make_control.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

        let handle = thread::Builder::new()
            .name("volume-poller".to_string())
            .spawn(move || {
                let control = match make_control() {
                    Ok(control) => {
                        let _ = ready_tx.send(Ok(()));
                        control
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                poll_loop(&control, &sink, interval, &thread_stop);
            })
            .map_err(|e| AudioError::PollerStart(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Polling system volume every {:?}", interval);
                Ok(AudioSubscription::new(stop, Some(handle)))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::PollerStart("poller thread exited".to_string()))
            }
        }
    }
}

fn poll_loop<V: VolumeControl>(
    control: &V,
    sink: &AudioEventSink,
    interval: Duration,
    stop: &AtomicBool,
) {
    let mut watcher = VolumeWatcher::new();
    let mut failures = ReadFailures::default();

    while !stop.load(Ordering::SeqCst) {
        match control.get_volume().and_then(|v| Ok((v, control.get_mute()?))) {
            Ok((volume, muted)) => {
                if failures.recovered() {
                    info!("System volume readable again");
                }
                for event in watcher.observe(volume, muted, Instant::now()) {
                    if !sink(event) {
                        debug!("Volume event receiver gone, stopping poller");
                        return;
                    }
                }
            }
            Err(e) if failures.failed() => error!("Failed to read system volume: {}", e),
            Err(e) => debug!("Still failing to read system volume: {}", e),
        }
        thread::sleep(interval);
    }
}
