//! Engine editions and their channel layouts.

use super::{ChannelId, ChannelKind, MixerError};

/// Voicemeeter edition reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerVariant {
    /// Voicemeeter (3 strips, 2 buses)
    Basic,

    /// Voicemeeter Banana (5 strips, 5 buses)
    Banana,

    /// Voicemeeter Potato (8 strips, 8 buses)
    Potato,
}

const BASIC_STRIPS: &[&str] = &["Hardware Input 1", "Hardware Input 2", "Voicemeeter Input"];
const BASIC_BUSES: &[&str] = &["Hardware Out A", "Virtual Out B"];

const BANANA_STRIPS: &[&str] = &[
    "Hardware Input 1",
    "Hardware Input 2",
    "Hardware Input 3",
    "Voicemeeter Input",
    "Voicemeeter AUX Input",
];
const BANANA_BUSES: &[&str] = &[
    "Hardware Out A1",
    "Hardware Out A2",
    "Hardware Out A3",
    "Virtual Out B1",
    "Virtual Out B2",
];

const POTATO_STRIPS: &[&str] = &[
    "Hardware Input 1",
    "Hardware Input 2",
    "Hardware Input 3",
    "Hardware Input 4",
    "Hardware Input 5",
    "Voicemeeter Input",
    "Voicemeeter AUX Input",
    "Voicemeeter VAIO3 Input",
];
const POTATO_BUSES: &[&str] = &[
    "Hardware Out A1",
    "Hardware Out A2",
    "Hardware Out A3",
    "Hardware Out A4",
    "Hardware Out A5",
    "Virtual Out B1",
    "Virtual Out B2",
    "Virtual Out B3",
];

impl MixerVariant {
    /// Map the remote API type code (1, 2, 3) to an edition.
    pub fn from_code(code: i32) -> Result<Self, MixerError> {
        match code {
            1 => Ok(MixerVariant::Basic),
            2 => Ok(MixerVariant::Banana),
            3 => Ok(MixerVariant::Potato),
            other => Err(MixerError::UnknownVariant(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MixerVariant::Basic => "Voicemeeter",
            MixerVariant::Banana => "Voicemeeter Banana",
            MixerVariant::Potato => "Voicemeeter Potato",
        }
    }

    fn friendly_names(&self, kind: ChannelKind) -> &'static [&'static str] {
        match (self, kind) {
            (MixerVariant::Basic, ChannelKind::Strip) => BASIC_STRIPS,
            (MixerVariant::Basic, ChannelKind::Bus) => BASIC_BUSES,
            (MixerVariant::Banana, ChannelKind::Strip) => BANANA_STRIPS,
            (MixerVariant::Banana, ChannelKind::Bus) => BANANA_BUSES,
            (MixerVariant::Potato, ChannelKind::Strip) => POTATO_STRIPS,
            (MixerVariant::Potato, ChannelKind::Bus) => POTATO_BUSES,
        }
    }

    /// Default name for a channel, `None` if the edition lacks it.
    pub fn friendly_name(&self, channel: ChannelId) -> Option<&'static str> {
        self.friendly_names(channel.kind)
            .get(channel.index as usize)
            .copied()
    }
}
