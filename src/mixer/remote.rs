//! Voicemeeter remote API bindings.
//!
//! Loads `VoicemeeterRemote64.dll` from the engine's install directory at
//! runtime and exposes it as a [`MixerClient`].

use super::{MixerClient, MixerConnector, MixerError, MixerVariant, Param};
use crate::platform::registry;
use libloading::Library;
use std::ffi::{c_char, CString};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[cfg(target_pointer_width = "64")]
const DLL_NAME: &str = "VoicemeeterRemote64.dll";
#[cfg(not(target_pointer_width = "64"))]
const DLL_NAME: &str = "VoicemeeterRemote.dll";

/// Size in UTF-16 units of the buffer the API fills for string parameters.
const STRING_PARAM_LEN: usize = 512;

type LoginFn = unsafe extern "system" fn() -> i32;
type LogoutFn = unsafe extern "system" fn() -> i32;
type GetTypeFn = unsafe extern "system" fn(*mut i32) -> i32;
type IsDirtyFn = unsafe extern "system" fn() -> i32;
type GetStringWFn = unsafe extern "system" fn(*const c_char, *mut u16) -> i32;
type SetFloatFn = unsafe extern "system" fn(*const c_char, f32) -> i32;

/// Function table resolved from the remote API DLL.
struct RemoteApi {
    login: LoginFn,
    logout: LogoutFn,
    get_type: GetTypeFn,
    is_dirty: IsDirtyFn,
    get_string_w: GetStringWFn,
    set_float: SetFloatFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl RemoteApi {
    fn load(path: &PathBuf) -> Result<Self, MixerError> {
        debug!("Loading remote API: {:?}", path);

        // SAFETY: the DLL is the vendor library found via its own uninstall key.
        let library =
            unsafe { Library::new(path).map_err(|e| MixerError::LibraryLoad(e.to_string()))? };

        unsafe {
            Ok(Self {
                login: symbol(&library, b"VBVMR_Login\0")?,
                logout: symbol(&library, b"VBVMR_Logout\0")?,
                get_type: symbol(&library, b"VBVMR_GetVoicemeeterType\0")?,
                is_dirty: symbol(&library, b"VBVMR_IsParametersDirty\0")?,
                get_string_w: symbol(&library, b"VBVMR_GetParameterStringW\0")?,
                set_float: symbol(&library, b"VBVMR_SetParameterFloat\0")?,
                _library: library,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, MixerError> {
    let sym: libloading::Symbol<T> = library.get(name).map_err(|_| {
        MixerError::MissingSymbol(String::from_utf8_lossy(&name[..name.len() - 1]).into_owned())
    })?;
    Ok(*sym)
}

fn param_cstring(param: &Param) -> CString {
    // Parameter names never contain interior NULs.
    CString::new(param.to_string()).unwrap_or_default()
}

/// Connects through the remote API DLL.
pub struct RemoteConnector {
    dll_path: Option<PathBuf>,
}

impl RemoteConnector {
    /// Locate the DLL via the engine's install directory.
    pub fn new() -> Self {
        let dll_path = registry::voicemeeter_install_dir().map(|dir| dir.join(DLL_NAME));
        Self { dll_path }
    }
}

impl Default for RemoteConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerConnector for RemoteConnector {
    type Client = RemoteClient;

    fn connect(&mut self) -> Result<RemoteClient, MixerError> {
        let path = self.dll_path.as_ref().ok_or(MixerError::LibraryNotFound)?;
        if !path.exists() {
            return Err(MixerError::LibraryNotFound);
        }

        let api = RemoteApi::load(path)?;

        // 0: ok, 1: ok but the application is not launched, <0: error
        let code = unsafe { (api.login)() };
        if code < 0 {
            return Err(MixerError::LoginFailed(code));
        }
        if code == 1 {
            warn!("Logged in to remote API, but the engine reports it is not running");
        }
        info!("Logged in to Voicemeeter remote API");

        Ok(RemoteClient {
            api,
            connected: true,
        })
    }
}

/// Logged-in remote API session.
pub struct RemoteClient {
    api: RemoteApi,
    connected: bool,
}

impl RemoteClient {
    fn ensure_connected(&self) -> Result<(), MixerError> {
        if self.connected {
            Ok(())
        } else {
            Err(MixerError::NotConnected)
        }
    }
}

impl MixerClient for RemoteClient {
    fn variant(&self) -> Result<MixerVariant, MixerError> {
        self.ensure_connected()?;
        let mut code = 0i32;
        let result = unsafe { (self.api.get_type)(&mut code) };
        if result != 0 {
            return Err(MixerError::Parameter {
                param: "VoicemeeterType".to_string(),
                code: result,
            });
        }
        MixerVariant::from_code(code)
    }

    fn poll_changed(&mut self) -> Result<bool, MixerError> {
        self.ensure_connected()?;
        match unsafe { (self.api.is_dirty)() } {
            0 => Ok(false),
            code if code > 0 => Ok(true),
            code => Err(MixerError::Parameter {
                param: "IsParametersDirty".to_string(),
                code,
            }),
        }
    }

    fn get_string(&self, param: &Param) -> Result<String, MixerError> {
        self.ensure_connected()?;
        let name = param_cstring(param);
        let mut buffer = [0u16; STRING_PARAM_LEN];
        let code = unsafe { (self.api.get_string_w)(name.as_ptr(), buffer.as_mut_ptr()) };
        if code != 0 {
            return Err(MixerError::Parameter {
                param: param.to_string(),
                code,
            });
        }
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        Ok(String::from_utf16_lossy(&buffer[..len]))
    }

    fn set_float(&mut self, param: &Param, value: f32) -> Result<(), MixerError> {
        self.ensure_connected()?;
        let name = param_cstring(param);
        let code = unsafe { (self.api.set_float)(name.as_ptr(), value) };
        if code != 0 {
            return Err(MixerError::Parameter {
                param: param.to_string(),
                code,
            });
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            unsafe {
                let _ = (self.api.logout)();
            }
            self.connected = false;
            info!("Logged out of Voicemeeter remote API");
        }
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
