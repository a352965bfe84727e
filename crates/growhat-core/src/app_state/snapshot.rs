use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::actuators::Pump;
use crate::channel::{Channel, ChannelState};
use crate::sensors::FrequencyMeter;

/// Readable state of one channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub channel: u8,
    /// Probe frequency in Hz
    pub moisture: f32,
    /// Saturation in percent
    pub saturation: f32,
    pub alarm: bool,
    pub enabled: bool,
    /// False when the probe is missing
    pub active: bool,
    /// Recent saturation samples (0.0..=1.0), oldest first
    pub history: Vec<f32>,
}

/// Sensor data served to the HTTP collaborator, written out as JSON
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub channels: Vec<ChannelSnapshot>,
    pub alarm_sleeping: bool,
}

impl<M: FrequencyMeter, P: Pump> Channel<M, P> {
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: self.index(),
            moisture: self.moisture(),
            saturation: self.saturation() * 100.0,
            alarm: self.alarm(),
            enabled: self.enabled(),
            active: self.state() == ChannelState::Active,
            history: self.history().to_vec(),
        }
    }
}
