#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(windows)]
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{
        mpsc::{self, Sender, TryRecvError},
        Mutex,
    },
    thread,
    time::{Duration, Instant},
};
#[cfg(windows)]
use tracing::{error, info};
#[cfg(windows)]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
#[cfg(windows)]
use voicemeeter_windows_volume::{
    audio::{
        endpoint::{device_enumerator, ComGuard, EndpointVolume},
        notifications::DeviceNotificationClient,
        AudioPoller, TopologyGeneration,
    },
    config::{ConfigError, JsonSettingsStore, Settings, SettingsStore},
    mixer::remote::RemoteConnector,
    platform::process::ToolhelpProcessFinder,
    sync::{CancelToken, ConnectTiming, ConnectionManager, SyncEngine, SyncError, SyncLoop, SystemClock},
    ui::{ChannelPresentation, Presentation, UiCommand},
    App, EngineEvent,
};
#[cfg(windows)]
use windows::core::PCWSTR;
#[cfg(windows)]
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MessageBoxW, PeekMessageW, TranslateMessage, MB_ICONERROR, MB_OK, MSG,
    PM_REMOVE,
};

#[cfg(windows)]
const LOG_FILE: &str = "voicemeeter-windows-volume.log";

#[cfg(windows)]
fn show_error(msg: &str) {
    unsafe {
        let msg_wide: Vec<u16> = msg.encode_utf16().chain(std::iter::once(0)).collect();
        let title_wide: Vec<u16> = "Voicemeeter Windows Volume"
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        MessageBoxW(
            None,
            PCWSTR(msg_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

/// Log to a file next to the settings; stderr when that is not writable.
#[cfg(windows)]
fn init_logging(dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("voicemeeter_windows_volume=info"));

    let file = dir.and_then(|dir| {
        fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
            .ok()
    });

    match file {
        Some(file) => tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(filter)
            .init(),
        None => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

#[cfg(windows)]
fn load_settings() -> Result<JsonSettingsStore, ConfigError> {
    let store = JsonSettingsStore::open_default()?;
    store.get().validate()?;
    info!("Settings loaded from {:?}", store.path());
    Ok(store)
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let dir = JsonSettingsStore::default_dir().ok();
    init_logging(dir.as_deref());
    info!("Starting Voicemeeter Windows Volume");

    let store = match load_settings() {
        Ok(store) => store,
        Err(e) => {
            error!("Invalid settings: {}", e);
            show_error(&format!("Invalid settings: {}", e));
            return Err(e.into());
        }
    };
    let settings = store.get();

    match run(store, &settings) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            show_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Run the tray on this thread and the sync engine on its own.
#[cfg(windows)]
fn run(store: JsonSettingsStore, settings: &Settings) -> anyhow::Result<i32> {
    let _com = ComGuard::apartment()?;

    let cancel = CancelToken::new();
    let sync_loop = SyncLoop::new(ConnectionManager::new(
        SystemClock,
        ConnectTiming::default(),
        cancel.clone(),
    ));
    let engine_tx = sync_loop.sender();
    let (ui_tx, ui_rx) = mpsc::channel();
    let topology = TopologyGeneration::new();

    let enumerator = device_enumerator()?;
    let device_tx = engine_tx.clone();
    let notifier = DeviceNotificationClient::new(
        topology.clone(),
        Box::new(move |event| {
            let _ = device_tx.send(EngineEvent::AudioDevicesChanged(event));
        }),
    )
    .register(&enumerator)?;

    let mut app = App::new(settings, engine_tx.clone(), cancel.clone())?;

    let engine_thread = thread::Builder::new()
        .name("sync-engine".to_string())
        .spawn(move || run_engine(sync_loop, store, topology, ui_tx))?;

    let mut msg = MSG::default();
    while !app.should_exit() {
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        app.process_tray_events();
        loop {
            match ui_rx.try_recv() {
                Ok(command) => app.apply(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    app.shutdown();
                    break;
                }
            }
        }

        thread::sleep(Duration::from_millis(16));
    }

    cancel.cancel();
    let _ = engine_tx.send(EngineEvent::Shutdown);
    let result = engine_thread
        .join()
        .map_err(|_| anyhow::anyhow!("sync engine thread panicked"))?;

    unsafe {
        let _ = enumerator.UnregisterEndpointNotificationCallback(&notifier);
    }

    match result {
        Ok(()) | Err(SyncError::Cancelled) => {
            info!("Exiting");
            Ok(0)
        }
        Err(e) => {
            error!("Sync engine stopped: {}", e);
            show_error(&format!("Voicemeeter Windows Volume stopped: {}", e));
            Ok(1)
        }
    }
}

#[cfg(windows)]
fn run_engine(
    mut sync_loop: SyncLoop<SystemClock>,
    store: JsonSettingsStore,
    topology: TopologyGeneration,
    ui_tx: Sender<UiCommand>,
) -> Result<(), SyncError> {
    let mut presentation = ChannelPresentation::new(ui_tx);
    let volume = match EndpointVolume::open(topology.clone()) {
        Ok(volume) => volume,
        Err(e) => {
            presentation.shutdown();
            return Err(e.into());
        }
    };

    let mut audio = AudioPoller::new(move || EndpointVolume::open(topology.clone()));
    let mut engine = SyncEngine::new(volume, store, presentation, Instant::now());
    sync_loop.run(
        &ToolhelpProcessFinder,
        &mut RemoteConnector::new(),
        &mut audio,
        &mut engine,
    )
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("voicemeeter-windows-volume only runs on Windows")
}
