//! In-memory collaborators for exercising the sync core.

use crate::audio::{
    AudioError, AudioEventSink, AudioSubscription, SystemAudioEvent, SystemAudioSource,
    VolumeControl,
};
use crate::config::{ConfigError, Settings, SettingsStore};
use crate::mixer::{ChannelId, MixerClient, MixerConnector, MixerError, MixerVariant, Param, ParamName};
use crate::platform::{ProcessError, ProcessFinder, ProcessPattern};
use crate::sync::bindings::BindingSnapshot;
use crate::sync::clock::manual::ManualClock;
use crate::sync::clock::{CancelToken, Clock};
use crate::ui::{MenuEntryId, Presentation};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct VolumeState {
    volume: u8,
    muted: bool,
    writes: Vec<u8>,
}

/// System volume backed by memory. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeVolume {
    state: Arc<Mutex<VolumeState>>,
}

impl FakeVolume {
    pub fn new(volume: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(VolumeState {
                volume,
                ..Default::default()
            })),
        }
    }

    /// Values passed to `set_volume`, in order.
    pub fn writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().unwrap().volume
    }

    pub fn set_current(&self, volume: u8) {
        self.state.lock().unwrap().volume = volume;
    }
}

impl VolumeControl for FakeVolume {
    fn get_volume(&self) -> Result<u8, AudioError> {
        Ok(self.state.lock().unwrap().volume)
    }

    fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state.volume = volume;
        state.writes.push(volume);
        Ok(())
    }

    fn get_mute(&self) -> Result<bool, AudioError> {
        Ok(self.state.lock().unwrap().muted)
    }
}

struct MixerState {
    variant: Option<MixerVariant>,
    labels: HashMap<ChannelId, String>,
    devices: HashMap<ChannelId, String>,
    failing_reads: bool,
    failing_writes: Vec<String>,
    writes: Vec<(String, f32)>,
    pending_change: bool,
    scheduled_changes: Vec<Instant>,
    clock: Option<Rc<ManualClock>>,
    disconnects: usize,
}

/// Mixing engine backed by memory. Clones share state.
#[derive(Clone)]
pub struct FakeMixer {
    state: Rc<RefCell<MixerState>>,
}

impl FakeMixer {
    pub fn new(variant: MixerVariant) -> Self {
        Self {
            state: Rc::new(RefCell::new(MixerState {
                variant: Some(variant),
                labels: HashMap::new(),
                devices: HashMap::new(),
                failing_reads: false,
                failing_writes: Vec::new(),
                writes: Vec::new(),
                pending_change: false,
                scheduled_changes: Vec::new(),
                clock: None,
                disconnects: 0,
            })),
        }
    }

    /// Engine reporting an edition id nobody knows.
    pub fn unknown_variant() -> Self {
        let mixer = Self::new(MixerVariant::Basic);
        mixer.state.borrow_mut().variant = None;
        mixer
    }

    pub fn with_label(self, channel: ChannelId, label: &str) -> Self {
        self.set_label(channel, label);
        self
    }

    pub fn with_device(self, channel: ChannelId, device: &str) -> Self {
        self.state
            .borrow_mut()
            .devices
            .insert(channel, device.to_string());
        self
    }

    /// Every string read fails.
    pub fn failing_reads(self) -> Self {
        self.set_failing_reads(true);
        self
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.state.borrow_mut().failing_reads = failing;
    }

    /// Writes to `param` fail.
    pub fn failing_write(self, param: Param) -> Self {
        self.state
            .borrow_mut()
            .failing_writes
            .push(param.to_string());
        self
    }

    /// Report a change at each instant of `clock`.
    pub fn with_changes_at(self, clock: Rc<ManualClock>, times: Vec<Instant>) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.clock = Some(clock);
            state.scheduled_changes = times;
        }
        self
    }

    pub fn set_label(&self, channel: ChannelId, label: &str) {
        self.state
            .borrow_mut()
            .labels
            .insert(channel, label.to_string());
    }

    /// Report one change at the next poll.
    pub fn notify_change(&self) {
        self.state.borrow_mut().pending_change = true;
    }

    /// Successful writes as `(parameter, value)`.
    pub fn writes(&self) -> Vec<(String, f32)> {
        self.state.borrow().writes.clone()
    }

    pub fn writes_to(&self, param: Param) -> Vec<f32> {
        let name = param.to_string();
        self.writes()
            .into_iter()
            .filter(|(p, _)| *p == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }
}

impl MixerClient for FakeMixer {
    fn variant(&self) -> Result<MixerVariant, MixerError> {
        self.state
            .borrow()
            .variant
            .ok_or(MixerError::UnknownVariant(9))
    }

    fn poll_changed(&mut self) -> Result<bool, MixerError> {
        let mut state = self.state.borrow_mut();
        let mut changed = std::mem::take(&mut state.pending_change);
        if let Some(now) = state.clock.as_ref().map(|c| c.now()) {
            let before = state.scheduled_changes.len();
            state.scheduled_changes.retain(|t| *t > now);
            changed |= state.scheduled_changes.len() != before;
        }
        Ok(changed)
    }

    fn get_string(&self, param: &Param) -> Result<String, MixerError> {
        let state = self.state.borrow();
        if state.failing_reads {
            return Err(MixerError::Parameter {
                param: param.to_string(),
                code: -2,
            });
        }
        let value = match param {
            Param::Channel(channel, ParamName::Label) => state.labels.get(channel).cloned(),
            Param::Channel(channel, ParamName::DeviceName) => state.devices.get(channel).cloned(),
            _ => None,
        };
        Ok(value.unwrap_or_default())
    }

    fn set_float(&mut self, param: &Param, value: f32) -> Result<(), MixerError> {
        let name = param.to_string();
        let mut state = self.state.borrow_mut();
        if state.failing_writes.contains(&name) {
            return Err(MixerError::Parameter {
                param: name,
                code: -3,
            });
        }
        state.writes.push((name, value));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.borrow_mut().disconnects += 1;
    }
}

/// Hands out clones of one [`FakeMixer`].
pub struct FakeConnector {
    mixer: FakeMixer,
    fail: bool,
    pub connects: usize,
}

impl FakeConnector {
    pub fn new(mixer: FakeMixer) -> Self {
        Self {
            mixer,
            fail: false,
            connects: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            mixer: FakeMixer::new(MixerVariant::Basic),
            fail: true,
            connects: 0,
        }
    }
}

impl MixerConnector for FakeConnector {
    type Client = FakeMixer;

    fn connect(&mut self) -> Result<FakeMixer, MixerError> {
        self.connects += 1;
        if self.fail {
            return Err(MixerError::LoginFailed(-1));
        }
        Ok(self.mixer.clone())
    }
}

#[derive(Debug, Default)]
struct PresentationState {
    items: Vec<BindingSnapshot>,
    enabled: Vec<MenuEntryId>,
    shutdowns: usize,
}

/// What a [`RecordingPresentation`] received. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct PresentationLog(Arc<Mutex<PresentationState>>);

impl PresentationLog {
    pub fn items(&self) -> Vec<BindingSnapshot> {
        self.0.lock().unwrap().items.clone()
    }

    pub fn enabled_entries(&self) -> Vec<MenuEntryId> {
        self.0.lock().unwrap().enabled.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.0.lock().unwrap().shutdowns
    }
}

pub struct RecordingPresentation {
    log: PresentationLog,
}

impl RecordingPresentation {
    pub fn new(log: PresentationLog) -> Self {
        Self { log }
    }
}

impl Presentation for RecordingPresentation {
    fn notify_item_changed(&mut self, snapshot: &BindingSnapshot) {
        self.log.0.lock().unwrap().items.push(snapshot.clone());
    }

    fn enable_menu_entry(&mut self, id: MenuEntryId) {
        self.log.0.lock().unwrap().enabled.push(id);
    }

    fn shutdown(&mut self) {
        self.log.0.lock().unwrap().shutdowns += 1;
    }
}

#[derive(Debug, Default)]
struct StoreState {
    settings: Settings,
    persisted: Vec<Settings>,
    fail: bool,
}

/// Settings held in memory; `persist` records a copy. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore(Arc<Mutex<StoreState>>);

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(Mutex::new(StoreState {
            settings,
            ..Default::default()
        })))
    }

    pub fn failing(settings: Settings) -> Self {
        let store = Self::new(settings);
        store.0.lock().unwrap().fail = true;
        store
    }

    /// Snapshots written by `persist`, oldest first.
    pub fn persisted(&self) -> Vec<Settings> {
        self.0.lock().unwrap().persisted.clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> Settings {
        self.0.lock().unwrap().settings.clone()
    }

    fn set(&mut self, settings: Settings) {
        self.0.lock().unwrap().settings = settings;
    }

    fn persist(&mut self) -> Result<(), ConfigError> {
        let mut state = self.0.lock().unwrap();
        if state.fail {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        let snapshot = state.settings.clone();
        state.persisted.push(snapshot);
        Ok(())
    }
}

/// Reports no engine process for the first `misses` scans.
pub struct FakeProcessFinder {
    misses: Cell<usize>,
    failures: Cell<usize>,
    pub scans: Cell<usize>,
}

impl FakeProcessFinder {
    pub fn running() -> Self {
        Self::after(0)
    }

    pub fn after(misses: usize) -> Self {
        Self {
            misses: Cell::new(misses),
            failures: Cell::new(0),
            scans: Cell::new(0),
        }
    }

    /// Fail the first `failures` scans before counting misses.
    pub fn with_failures(self, failures: usize) -> Self {
        self.failures.set(failures);
        self
    }
}

impl ProcessFinder for FakeProcessFinder {
    fn find_running(&self, _pattern: &ProcessPattern) -> Result<Option<u32>, ProcessError> {
        self.scans.set(self.scans.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(ProcessError::Snapshot("access denied".to_string()));
        }
        if self.misses.get() > 0 {
            self.misses.set(self.misses.get() - 1);
            return Ok(None);
        }
        Ok(Some(4242))
    }
}

/// Audio source whose events are pushed by the test.
#[derive(Clone, Default)]
pub struct FakeAudioSource {
    sink: Arc<Mutex<Option<AudioEventSink>>>,
    stop: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    pub interval: Arc<Mutex<Option<Duration>>>,
}

impl FakeAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the subscriber. False when nobody listens.
    pub fn emit(&self, event: SystemAudioEvent) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink(event),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub fn was_cancelled(&self) -> bool {
        self.stop
            .lock()
            .unwrap()
            .as_ref()
            .map(|stop| stop.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl SystemAudioSource for FakeAudioSource {
    fn subscribe(
        &mut self,
        sink: AudioEventSink,
        interval: Duration,
    ) -> Result<AudioSubscription, AudioError> {
        let stop = Arc::new(AtomicBool::new(false));
        *self.sink.lock().unwrap() = Some(sink);
        *self.stop.lock().unwrap() = Some(stop.clone());
        *self.interval.lock().unwrap() = Some(interval);
        Ok(AudioSubscription::new(stop, None))
    }
}

/// Manual clock that cancels a token once enough time has passed.
pub struct CancellingClock {
    pub clock: ManualClock,
    token: CancelToken,
    after: Duration,
}

impl CancellingClock {
    pub fn new(token: CancelToken, after: Duration) -> Self {
        Self {
            clock: ManualClock::new(),
            token,
            after,
        }
    }
}

impl Clock for CancellingClock {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
        if self.clock.elapsed() >= self.after {
            self.token.cancel();
        }
    }
}
