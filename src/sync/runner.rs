//! The engine thread's main loop.

use super::clock::Clock;
use super::connection::ConnectionManager;
use super::engine::SyncEngine;
use super::SyncError;
use crate::audio::{DeviceEvent, SystemAudioEvent, SystemAudioSource, VolumeControl};
use crate::config::SettingsStore;
use crate::mixer::{MixerClient, MixerConnector};
use crate::platform::ProcessFinder;
use crate::ui::{MenuAction, Presentation};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

/// Input to the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SystemAudio(SystemAudioEvent),
    Menu(MenuAction),
    AudioDevicesChanged(DeviceEvent),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connecting,
    Syncing,
    Terminated,
}

/// Owns the event queue and runs connect, then sync, then teardown.
pub struct SyncLoop<C> {
    state: LoopState,
    manager: ConnectionManager<C>,
    sender: Sender<EngineEvent>,
    events: Receiver<EngineEvent>,
}

impl<C: Clock> SyncLoop<C> {
    pub fn new(manager: ConnectionManager<C>) -> Self {
        let (sender, events) = channel();
        Self {
            state: LoopState::Idle,
            manager,
            sender,
            events,
        }
    }

    /// Handle for producers on other threads.
    pub fn sender(&self) -> Sender<EngineEvent> {
        self.sender.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub fn run<F, K, A, V, S, P>(
        &mut self,
        finder: &F,
        connector: &mut K,
        audio: &mut A,
        engine: &mut SyncEngine<K::Client, V, S, P>,
    ) -> Result<(), SyncError>
    where
        F: ProcessFinder + ?Sized,
        K: MixerConnector,
        A: SystemAudioSource,
        V: VolumeControl,
        S: SettingsStore,
        P: Presentation,
    {
        self.state = LoopState::Connecting;
        let client = match self.manager.connect(finder, connector) {
            Ok(client) => client,
            Err(e) => {
                self.state = LoopState::Terminated;
                engine.presentation_mut().shutdown();
                return Err(e);
            }
        };
        engine.attach(client);

        // Menu clicks made while connecting still count; stale volume readings do not.
        let mut backlog = Vec::new();
        for event in self.events.try_iter() {
            match event {
                EngineEvent::SystemAudio(_) => {}
                other => backlog.push(other),
            }
        }

        let settings = engine.settings();
        let sender = self.sender.clone();
        let mut subscription = match audio.subscribe(
            Box::new(move |event| sender.send(EngineEvent::SystemAudio(event)).is_ok()),
            settings.polling_interval(),
        ) {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state = LoopState::Terminated;
                engine.terminate();
                return Err(e.into());
            }
        };

        self.state = LoopState::Syncing;
        let now = self.manager.clock().now();
        engine.handle_mixer_change();
        engine.restore_initial_volume(now);
        if settings.restart_audio_engine_on_app_launch {
            engine.restart_audio_engine();
        }

        let mut running = backlog
            .into_iter()
            .all(|event| self.dispatch(event, engine));

        let poll_interval = self.manager.timing().change_poll_interval;
        while running {
            match self.events.recv_timeout(poll_interval) {
                Ok(event) => running = self.dispatch(event, engine),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => running = false,
            }
            if self.manager.cancel_token().is_cancelled() {
                running = false;
            }
            if running {
                engine.poll_mixer();
                engine.poll_due_restart(self.manager.clock().now());
            }
        }

        info!("Stopping sync");
        subscription.cancel();
        engine.terminate();
        self.state = LoopState::Terminated;
        Ok(())
    }

    fn dispatch<M, V, S, P>(&mut self, event: EngineEvent, engine: &mut SyncEngine<M, V, S, P>) -> bool
    where
        M: MixerClient,
        V: VolumeControl,
        S: SettingsStore,
        P: Presentation,
    {
        match event {
            EngineEvent::SystemAudio(SystemAudioEvent::VolumeChanged { new, at, .. }) => {
                engine.handle_volume_change(new, at);
                true
            }
            EngineEvent::SystemAudio(SystemAudioEvent::MuteToggled { new, .. }) => {
                engine.handle_mute_toggle(new);
                true
            }
            EngineEvent::Menu(action) => engine.handle_menu_action(action),
            EngineEvent::AudioDevicesChanged(device) => {
                engine.handle_device_change(&device, self.manager.clock().now());
                true
            }
            EngineEvent::Shutdown => {
                debug!("Shutdown requested");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::mixer::{ChannelId, MixerVariant, Param, ParamName};
    use crate::sync::clock::manual::ManualClock;
    use crate::sync::clock::CancelToken;
    use crate::sync::connection::ConnectTiming;
    use crate::sync::testing::{
        FakeAudioSource, FakeConnector, FakeMixer, FakeProcessFinder, FakeVolume,
        MemorySettingsStore, PresentationLog, RecordingPresentation,
    };
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    type TestEngine =
        SyncEngine<FakeMixer, FakeVolume, MemorySettingsStore, RecordingPresentation>;

    fn sync_loop() -> SyncLoop<Rc<ManualClock>> {
        let timing = ConnectTiming {
            change_poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        SyncLoop::new(ConnectionManager::new(
            Rc::new(ManualClock::new()),
            timing,
            CancelToken::new(),
        ))
    }

    fn engine(settings: Settings, volume: &FakeVolume, log: &PresentationLog) -> TestEngine {
        SyncEngine::new(
            volume.clone(),
            MemorySettingsStore::new(settings),
            RecordingPresentation::new(log.clone()),
            Instant::now(),
        )
    }

    #[test]
    fn test_fatal_connect_shuts_presentation_down() {
        let mut sync = sync_loop();
        let volume = FakeVolume::new(40);
        let log = PresentationLog::default();
        let mut engine = engine(Settings::default(), &volume, &log);
        let mut audio = FakeAudioSource::new();

        let result = sync.run(
            &FakeProcessFinder::running(),
            &mut FakeConnector::failing(),
            &mut audio,
            &mut engine,
        );

        assert!(matches!(result, Err(SyncError::Connect(_))));
        assert_eq!(sync.state(), LoopState::Terminated);
        assert_eq!(log.shutdowns(), 1);
        assert!(!audio.is_subscribed());
    }

    #[test]
    fn test_queued_events_processed_until_shutdown() {
        let mut sync = sync_loop();
        let mixer = FakeMixer::new(MixerVariant::Banana);
        let volume = FakeVolume::new(40);
        let log = PresentationLog::default();
        let settings = Settings {
            bindings: vec![ChannelId::strip(0), ChannelId::bus(1)],
            ..Default::default()
        };
        let mut engine = engine(settings, &volume, &log);
        let mut audio = FakeAudioSource::new();
        let sender = sync.sender();
        let t0 = Instant::now();

        // queued before syncing: discarded
        sender
            .send(EngineEvent::SystemAudio(SystemAudioEvent::VolumeChanged {
                old: 10,
                new: 20,
                at: t0,
            }))
            .unwrap();
        sender
            .send(EngineEvent::Menu(MenuAction::ShowMixer))
            .unwrap();

        let producer = audio.clone();
        let thread_sender = sender.clone();
        let handle = std::thread::spawn(move || {
            while !producer.is_subscribed() {
                std::thread::sleep(Duration::from_millis(1));
            }
            producer.emit(SystemAudioEvent::VolumeChanged {
                old: 40,
                new: 60,
                at: t0,
            });
            producer.emit(SystemAudioEvent::MuteToggled {
                old: false,
                new: true,
            });
            thread_sender.send(EngineEvent::Shutdown).unwrap();
        });

        let result = sync.run(
            &FakeProcessFinder::running(),
            &mut FakeConnector::new(mixer.clone()),
            &mut audio,
            &mut engine,
        );
        handle.join().unwrap();

        assert!(result.is_ok());
        assert_eq!(sync.state(), LoopState::Terminated);
        assert_eq!(mixer.writes_to(Param::gain(ChannelId::strip(0))), vec![-16.8]);
        assert_eq!(mixer.writes_to(Param::gain(ChannelId::bus(1))), vec![-16.8]);
        assert_eq!(mixer.writes_to(Param::mute(ChannelId::bus(1))), vec![1.0]);
        assert_eq!(mixer.writes_to(Param::Command(ParamName::Show)), vec![1.0]);
        assert_eq!(mixer.disconnects(), 1);
        assert!(audio.was_cancelled());
        assert_eq!(log.shutdowns(), 1);
        assert_eq!(*audio.interval.lock().unwrap(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_startup_restores_volume_and_restarts_engine() {
        let mut sync = sync_loop();
        let mixer = FakeMixer::new(MixerVariant::Basic).with_label(ChannelId::strip(0), "Mic");
        let volume = FakeVolume::new(90);
        let log = PresentationLog::default();
        let settings = Settings {
            remember_volume: true,
            initial_volume: Some(35),
            restart_audio_engine_on_app_launch: true,
            bindings: vec![ChannelId::strip(0)],
            ..Default::default()
        };
        let mut engine = engine(settings, &volume, &log);
        sync.sender().send(EngineEvent::Shutdown).unwrap();

        sync.run(
            &FakeProcessFinder::running(),
            &mut FakeConnector::new(mixer.clone()),
            &mut FakeAudioSource::new(),
            &mut engine,
        )
        .unwrap();

        assert_eq!(volume.writes(), vec![35]);
        assert_eq!(mixer.writes_to(Param::gain(ChannelId::strip(0))), vec![-34.8]);
        assert_eq!(mixer.writes_to(Param::Command(ParamName::Restart)), vec![1.0]);
        assert!(log.items().iter().any(|s| s.label == "Mic"));
    }

    #[test]
    fn test_exit_menu_action_terminates() {
        let mut sync = sync_loop();
        let mixer = FakeMixer::new(MixerVariant::Basic);
        let volume = FakeVolume::new(40);
        let log = PresentationLog::default();
        let mut engine = engine(Settings::default(), &volume, &log);
        sync.sender().send(EngineEvent::Menu(MenuAction::Exit)).unwrap();

        let result = sync.run(
            &FakeProcessFinder::running(),
            &mut FakeConnector::new(mixer.clone()),
            &mut FakeAudioSource::new(),
            &mut engine,
        );

        assert!(result.is_ok());
        assert_eq!(mixer.disconnects(), 1);
        assert_eq!(log.shutdowns(), 1);
    }

    #[test]
    fn test_sender_shared_with_device_callbacks() {
        let sync = sync_loop();
        let tx = sync.sender();
        // Device notifications arrive on COM threads through a shared callback.
        let handler: Box<dyn Fn(DeviceEvent) + Send + Sync> = Box::new(move |event| {
            let _ = tx.send(EngineEvent::AudioDevicesChanged(event));
        });
        let handler = std::sync::Arc::new(handler);

        let worker = handler.clone();
        std::thread::spawn(move || {
            (*worker)(DeviceEvent::DeviceAdded {
                device_id: "speakers".to_string(),
            })
        })
        .join()
        .unwrap();

        assert!(matches!(
            sync.events.try_recv(),
            Ok(EngineEvent::AudioDevicesChanged(DeviceEvent::DeviceAdded { .. }))
        ));
    }
}
