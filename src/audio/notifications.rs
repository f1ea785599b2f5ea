//! Playback device change notifications using IMMNotificationClient.

use super::{DeviceEvent, TopologyGeneration};
use windows::core::{implement, PCWSTR};
use windows::Win32::Media::Audio::{
    eRender, EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient,
    IMMNotificationClient_Impl, DEVICE_STATE,
};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;
// Re-export windows_core so the implement macro can find it
#[allow(unused_imports)]
use windows_core;

/// Callback receiving endpoint topology events.
pub type DeviceEventHandler = Box<dyn Fn(DeviceEvent) + Send + Sync>;

/// Notification client that bumps the topology generation and forwards events.
#[implement(IMMNotificationClient)]
pub struct DeviceNotificationClient {
    topology: TopologyGeneration,
    handler: DeviceEventHandler,
}

impl DeviceNotificationClient {
    pub fn new(topology: TopologyGeneration, handler: DeviceEventHandler) -> Self {
        Self { topology, handler }
    }

    /// Register this notification client with an enumerator.
    /// Takes ownership of self because the COM interface needs to own the data.
    pub fn register(
        self,
        enumerator: &IMMDeviceEnumerator,
    ) -> Result<IMMNotificationClient, windows::core::Error> {
        unsafe {
            let client: IMMNotificationClient = self.into();
            enumerator.RegisterEndpointNotificationCallback(&client)?;
            Ok(client)
        }
    }
}

impl DeviceNotificationClient_Impl {
    fn emit(&self, event: DeviceEvent) {
        self.topology.bump();
        (self.handler)(event);
    }
}

impl IMMNotificationClient_Impl for DeviceNotificationClient_Impl {
    fn OnDeviceStateChanged(
        &self,
        pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        unsafe {
            if let Ok(id) = pwstrdeviceid.to_string() {
                self.emit(DeviceEvent::DeviceStateChanged { device_id: id });
            }
        }
        Ok(())
    }

    fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        unsafe {
            if let Ok(id) = pwstrdeviceid.to_string() {
                self.emit(DeviceEvent::DeviceAdded { device_id: id });
            }
        }
        Ok(())
    }

    fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        unsafe {
            if let Ok(id) = pwstrdeviceid.to_string() {
                self.emit(DeviceEvent::DeviceRemoved { device_id: id });
            }
        }
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        _role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        // Only care about playback devices
        if flow != eRender {
            return Ok(());
        }

        unsafe {
            let device_id = if pwstrdefaultdeviceid.is_null() {
                None
            } else {
                pwstrdefaultdeviceid.to_string().ok()
            };
            self.emit(DeviceEvent::DefaultDeviceChanged { device_id });
        }
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        Ok(())
    }
}
