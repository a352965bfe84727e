//! Grow HAT pin layout
//!
//! All numbers are BCM GPIO numbers. Channels are numbered 1..=3 to match the
//! labels printed on the board.

/// Number of sensor/pump channels on the board
pub const CHANNEL_COUNT: usize = 3;

/// Capacitive moisture probe outputs, channel 1..=3
pub const MOISTURE_PINS: [u8; CHANNEL_COUNT] = [23, 8, 25];
/// Shared interrupt line of the probe comparators
pub const MOISTURE_INT_PIN: u8 = 4;
/// Pump drive outputs, channel 1..=3
pub const PUMP_PINS: [u8; CHANNEL_COUNT] = [17, 27, 22];

pub const PIEZO_PIN: u8 = 13;
/// Tone the piezo PWM line is tuned to
pub const PIEZO_FREQUENCY_HZ: u32 = 440;

pub const BUTTON_A: u8 = 5;
pub const BUTTON_B: u8 = 6;
pub const BUTTON_X: u8 = 16;
pub const BUTTON_Y: u8 = 24;

/// The pins belonging to a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPins {
    pub moisture: u8,
    pub pump: u8,
}

impl ChannelPins {
    /// Pins for channel `index` (1-based). Returns `None` outside 1..=3.
    pub const fn for_channel(index: u8) -> Option<Self> {
        if index == 0 || index as usize > CHANNEL_COUNT {
            return None;
        }
        let slot = index as usize - 1;
        Some(Self {
            moisture: MOISTURE_PINS[slot],
            pump: PUMP_PINS[slot],
        })
    }
}
