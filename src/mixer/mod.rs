//! Voicemeeter mixing engine boundary.
//!
//! The core only talks to the engine through [`MixerConnector`] and
//! [`MixerClient`]. On Windows these are backed by the vendor remote API DLL
//! (see [`remote`]); tests use in-memory fakes.

#[cfg(windows)]
pub mod remote;
pub mod variant;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use variant::MixerVariant;

/// Highest channel index of either kind exposed by any engine edition.
pub const MAX_CHANNEL_INDEX: u8 = 7;

/// Kind of addressable engine channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    /// Input strip
    Strip,

    /// Output bus
    Bus,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Strip, ChannelKind::Bus];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Strip => "Strip",
            ChannelKind::Bus => "Bus",
        }
    }
}

/// One engine channel, e.g. `Strip_0` or `Bus_3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId {
    pub kind: ChannelKind,
    pub index: u8,
}

impl ChannelId {
    pub fn new(kind: ChannelKind, index: u8) -> Self {
        Self { kind, index }
    }

    pub fn strip(index: u8) -> Self {
        Self::new(ChannelKind::Strip, index)
    }

    pub fn bus(index: u8) -> Self {
        Self::new(ChannelKind::Bus, index)
    }

    /// Every channel id the application tracks, strips first.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        ChannelKind::ALL
            .into_iter()
            .flat_map(|kind| (0..=MAX_CHANNEL_INDEX).map(move |index| ChannelId::new(kind, index)))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.index)
    }
}

/// Error parsing a `Strip_N` / `Bus_N` channel id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid channel id: {0}")]
pub struct ParseChannelIdError(pub String);

impl FromStr for ChannelId {
    type Err = ParseChannelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseChannelIdError(s.to_string());
        let (kind, index) = s.split_once('_').ok_or_else(err)?;
        let kind = match kind {
            "Strip" => ChannelKind::Strip,
            "Bus" => ChannelKind::Bus,
            _ => return Err(err()),
        };
        let index: u8 = index.parse().map_err(|_| err())?;
        if index > MAX_CHANNEL_INDEX {
            return Err(err());
        }
        Ok(ChannelId::new(kind, index))
    }
}

impl serde::Serialize for ChannelId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ChannelId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Named engine parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamName {
    Gain,
    Mute,
    Label,
    DeviceName,
    Restart,
    Show,
}

impl ParamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Gain => "Gain",
            ParamName::Mute => "Mute",
            ParamName::Label => "Label",
            ParamName::DeviceName => "device.name",
            ParamName::Restart => "Restart",
            ParamName::Show => "Show",
        }
    }
}

/// Fully qualified engine parameter, rendered as `Strip[0].Gain` or `Command.Restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Channel(ChannelId, ParamName),
    Command(ParamName),
}

impl Param {
    pub fn gain(channel: ChannelId) -> Self {
        Param::Channel(channel, ParamName::Gain)
    }

    pub fn mute(channel: ChannelId) -> Self {
        Param::Channel(channel, ParamName::Mute)
    }

    pub fn label(channel: ChannelId) -> Self {
        Param::Channel(channel, ParamName::Label)
    }

    pub fn device_name(channel: ChannelId) -> Self {
        Param::Channel(channel, ParamName::DeviceName)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Channel(channel, name) => write!(
                f,
                "{}[{}].{}",
                channel.kind.as_str(),
                channel.index,
                name.as_str()
            ),
            Param::Command(name) => write!(f, "Command.{}", name.as_str()),
        }
    }
}

/// Mixing engine error types.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("Voicemeeter remote API library not found")]
    LibraryNotFound,

    #[error("Failed to load remote API library: {0}")]
    LibraryLoad(String),

    #[error("Remote API symbol missing: {0}")]
    MissingSymbol(String),

    #[error("Login to the mixing engine failed (code {0})")]
    LoginFailed(i32),

    #[error("Not connected to the mixing engine")]
    NotConnected,

    #[error("Unknown mixing engine type: {0}")]
    UnknownVariant(i32),

    #[error("Parameter {param} failed (code {code})")]
    Parameter { param: String, code: i32 },
}

/// Opens a connection to the mixing engine.
pub trait MixerConnector {
    type Client: MixerClient;

    /// Initialize the API and log in. Failure here is fatal for the run.
    fn connect(&mut self) -> Result<Self::Client, MixerError>;
}

/// Connected mixing engine.
pub trait MixerClient {
    /// Engine edition currently running.
    fn variant(&self) -> Result<MixerVariant, MixerError>;

    /// True when engine parameters changed since the last call.
    fn poll_changed(&mut self) -> Result<bool, MixerError>;

    fn get_string(&self, param: &Param) -> Result<String, MixerError>;

    fn set_float(&mut self, param: &Param, value: f32) -> Result<(), MixerError>;

    /// Release the engine connection. Safe to call more than once.
    fn disconnect(&mut self);
}
