//! Channel set and typed per-channel values

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FilterError;

/// A scalar geometric signal tracked per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Eye aspect ratio, averaged over both eyes
    Ear,
    /// Head tilt from body pose (degrees)
    HeadTilt,
    /// Head pitch from face landmarks (degrees, positive = down)
    HeadPitch,
    /// Head roll from face landmarks (degrees)
    HeadRoll,
    /// Shoulder line angle (degrees)
    ShoulderAngle,
    /// Inter-pupillary distance in normalized image units
    Ipd,
}

impl Channel {
    pub const COUNT: usize = 6;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Ear,
        Channel::HeadTilt,
        Channel::HeadPitch,
        Channel::HeadRoll,
        Channel::ShoulderAngle,
        Channel::Ipd,
    ];

    /// Position of this channel in [`Channel::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Channel::Ear => "ear",
            Channel::HeadTilt => "head_tilt",
            Channel::HeadPitch => "head_pitch",
            Channel::HeadRoll => "head_roll",
            Channel::ShoulderAngle => "shoulder_angle",
            Channel::Ipd => "ipd",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FilterError::UnknownChannel(s.to_string()))
    }
}

/// One value per channel, indexed by [`Channel`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelValues([f64; Channel::COUNT]);

impl ChannelValues {
    /// All channels set to zero
    pub const fn zeroed() -> Self {
        Self([0.0; Channel::COUNT])
    }

    /// Build values by evaluating `f` for every channel
    pub fn from_fn(mut f: impl FnMut(Channel) -> f64) -> Self {
        let mut values = Self::zeroed();
        for channel in Channel::ALL {
            values[channel] = f(channel);
        }
        values
    }

    /// Builder-style setter
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self[channel] = value;
        self
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        self.0[channel.index()] = value;
    }

    /// Iterate `(channel, value)` pairs in channel order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        Channel::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

impl Index<Channel> for ChannelValues {
    type Output = f64;

    fn index(&self, channel: Channel) -> &f64 {
        &self.0[channel.index()]
    }
}

impl IndexMut<Channel> for ChannelValues {
    fn index_mut(&mut self, channel: Channel) -> &mut f64 {
        &mut self.0[channel.index()]
    }
}
