//! Connection handshake with the mixing engine.
//!
//! Waits for the engine process, logs in, then waits for the engine to go
//! quiet: right after login it reports a burst of parameter changes while it
//! loads its configuration, and reading labels during that burst yields
//! stale values.

use super::clock::{CancelToken, Clock};
use super::SyncError;
use crate::mixer::{MixerClient, MixerConnector};
use crate::platform::{ProcessFinder, ProcessPattern};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingProcess,
    Connecting,
    Initializing,
    Ready,
    Failed,
}

/// Intervals used while connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTiming {
    pub process_scan_interval: Duration,
    pub change_poll_interval: Duration,
    pub quiescence_check_interval: Duration,
    pub quiescence_window: Duration,
}

impl Default for ConnectTiming {
    fn default() -> Self {
        Self {
            process_scan_interval: Duration::from_secs(1),
            change_poll_interval: Duration::from_millis(100),
            quiescence_check_interval: Duration::from_secs(1),
            quiescence_window: Duration::from_secs(3),
        }
    }
}

/// Remembers when the engine last reported a change.
#[derive(Debug, Clone, Copy)]
pub struct QuiescenceTracker {
    last_change: Instant,
    window: Duration,
}

impl QuiescenceTracker {
    pub fn new(seed: Instant, window: Duration) -> Self {
        Self {
            last_change: seed,
            window,
        }
    }

    pub fn observe(&mut self, at: Instant) {
        if at > self.last_change {
            self.last_change = at;
        }
    }

    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    pub fn is_quiescent(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_change) >= self.window
    }
}

/// Drives [`ConnectionState`] from `Disconnected` to `Ready` or `Failed`.
pub struct ConnectionManager<C> {
    state: ConnectionState,
    clock: C,
    timing: ConnectTiming,
    cancel: CancelToken,
    pattern: ProcessPattern,
}

impl<C: Clock> ConnectionManager<C> {
    pub fn new(clock: C, timing: ConnectTiming, cancel: CancelToken) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            clock,
            timing,
            cancel,
            pattern: ProcessPattern::voicemeeter(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timing(&self) -> ConnectTiming {
        self.timing
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run the handshake. A connect failure is final; it is never retried.
    pub fn connect<F, K>(&mut self, finder: &F, connector: &mut K) -> Result<K::Client, SyncError>
    where
        F: ProcessFinder + ?Sized,
        K: MixerConnector,
    {
        self.await_process(finder)?;

        self.state = ConnectionState::Connecting;
        let mut client = match connector.connect() {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to Voicemeeter: {}", e);
                self.state = ConnectionState::Failed;
                return Err(e.into());
            }
        };
        info!("Connected to Voicemeeter, waiting for it to settle");

        self.state = ConnectionState::Initializing;
        if let Err(e) = self.await_quiescence(&mut client) {
            client.disconnect();
            return Err(e);
        }

        self.state = ConnectionState::Ready;
        info!("Voicemeeter connection ready");
        Ok(client)
    }

    fn await_process<F: ProcessFinder + ?Sized>(&mut self, finder: &F) -> Result<(), SyncError> {
        self.state = ConnectionState::AwaitingProcess;
        let mut announced = false;

        loop {
            self.check_cancelled()?;
            match finder.find_running(&self.pattern) {
                Ok(Some(pid)) => {
                    info!("Found Voicemeeter process (pid {})", pid);
                    return Ok(());
                }
                Ok(None) if !announced => {
                    info!("Waiting for Voicemeeter to start");
                    announced = true;
                }
                Ok(None) => {}
                Err(e) => warn!("Process scan failed: {}", e),
            }
            self.pause(self.timing.process_scan_interval)?;
        }
    }

    fn await_quiescence<M: MixerClient>(&mut self, client: &mut M) -> Result<(), SyncError> {
        let mut tracker = QuiescenceTracker::new(self.clock.now(), self.timing.quiescence_window);
        let mut next_check = self.clock.now() + self.timing.quiescence_check_interval;

        loop {
            self.check_cancelled()?;

            let now = self.clock.now();
            match client.poll_changed() {
                Ok(true) => {
                    debug!("Voicemeeter reported changes while settling");
                    tracker.observe(now);
                }
                Ok(false) => {}
                Err(e) => debug!("Change poll failed while settling: {}", e),
            }

            if now >= next_check {
                if tracker.is_quiescent(now) {
                    return Ok(());
                }
                next_check += self.timing.quiescence_check_interval;
            }

            self.pause(self.timing.change_poll_interval)?;
        }
    }

    fn check_cancelled(&mut self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            debug!("Connection attempt cancelled");
            self.state = ConnectionState::Disconnected;
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn pause(&mut self, duration: Duration) -> Result<(), SyncError> {
        self.check_cancelled()?;
        self.clock.sleep(duration);
        self.check_cancelled()
    }
}
