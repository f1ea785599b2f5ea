//! Default playback endpoint volume using IAudioEndpointVolume.

use super::{AudioError, TopologyGeneration, VolumeControl};
use std::cell::{Cell, RefCell};
use tracing::debug;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
    COINIT_MULTITHREADED,
};

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Single-threaded apartment, for the UI thread.
    pub fn apartment() -> Result<Self, AudioError> {
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(AudioError::ComInitFailed)?;
        }
        Ok(Self { initialized: true })
    }

    /// Multithreaded apartment, for worker threads without a message pump.
    pub fn multithreaded() -> Result<Self, AudioError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(AudioError::ComInitFailed)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Create the MMDevice enumerator. COM must be initialized on this thread.
pub fn device_enumerator() -> Result<IMMDeviceEnumerator, AudioError> {
    unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(AudioError::EnumerationFailed) }
}

/// Volume control for whatever the default playback device currently is.
///
/// Owns its COM apartment, so build it on the thread that will use it.
pub struct EndpointVolume {
    enumerator: IMMDeviceEnumerator,
    endpoint: RefCell<Option<IAudioEndpointVolume>>,
    topology: TopologyGeneration,
    resolved_at: Cell<u64>,
    // Dropped last: COM interfaces above must be released first.
    _com: ComGuard,
}

impl EndpointVolume {
    pub fn open(topology: TopologyGeneration) -> Result<Self, AudioError> {
        let com = ComGuard::multithreaded()?;
        let enumerator = device_enumerator()?;
        let volume = Self {
            enumerator,
            endpoint: RefCell::new(None),
            resolved_at: Cell::new(topology.current()),
            topology,
            _com: com,
        };
        volume.resolve()?;
        Ok(volume)
    }

    fn resolve(&self) -> Result<IAudioEndpointVolume, AudioError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| AudioError::NoDefaultDevice)?;
            let endpoint: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|_| AudioError::VolumeNotAvailable)?;
            *self.endpoint.borrow_mut() = Some(endpoint.clone());
            Ok(endpoint)
        }
    }

    /// Current endpoint, re-resolved after a topology change.
    fn endpoint(&self) -> Result<IAudioEndpointVolume, AudioError> {
        let generation = self.topology.current();
        if generation != self.resolved_at.get() {
            debug!("Playback topology changed, re-resolving default endpoint");
            self.resolved_at.set(generation);
            *self.endpoint.borrow_mut() = None;
        }

        let cached = self.endpoint.borrow().clone();
        match cached {
            Some(endpoint) => Ok(endpoint),
            None => self.resolve(),
        }
    }
}

impl VolumeControl for EndpointVolume {
    fn get_volume(&self) -> Result<u8, AudioError> {
        unsafe {
            let level = self
                .endpoint()?
                .GetMasterVolumeLevelScalar()
                .map_err(AudioError::WindowsError)?;
            Ok((level.clamp(0.0, 1.0) * 100.0).round() as u8)
        }
    }

    fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        let level = f32::from(volume.min(100)) / 100.0;
        unsafe {
            self.endpoint()?
                .SetMasterVolumeLevelScalar(level, std::ptr::null())
                .map_err(AudioError::WindowsError)?;
        }
        Ok(())
    }

    fn get_mute(&self) -> Result<bool, AudioError> {
        unsafe {
            let muted = self
                .endpoint()?
                .GetMute()
                .map_err(AudioError::WindowsError)?;
            Ok(muted.as_bool())
        }
    }
}
