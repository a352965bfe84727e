use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;
use log::{debug, error, info};

use super::FrequencyMeter;
use crate::gpio::GpioChip;

/// Counting window used when none is given
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Poll-and-count frequency meter.
///
/// Every call to [`sample`](FrequencyMeter::sample) reads the pin once and
/// counts level changes. When the window has run its length the estimate
/// becomes `transitions / window` and counting starts over. All state lives on
/// the polling side, so no locking is needed.
///
/// The estimate is a transition rate: a square wave of `f` Hz reads as `2f`.
/// The default calibration points in [`ChannelSettings`] are on the
/// edge-triggered scale (`f`), so a channel read by this meter needs its
/// wet and dry points measured with it.
///
/// [`ChannelSettings`]: crate::config::ChannelSettings
pub struct PolledMeter<P: InputPin> {
    pin: Option<P>,
    gpio: u8,
    window: Duration,
    window_start: Option<Instant>,
    last_level: Option<bool>,
    transitions: u32,
    frequency: f32,
}

impl<P: InputPin> PolledMeter<P> {
    /// Meter over an already claimed pin
    pub fn new(pin: P, gpio: u8) -> Self {
        Self {
            pin: Some(pin),
            ..Self::inactive(gpio)
        }
    }

    /// Meter with no pin; reads 0 Hz forever
    pub fn inactive(gpio: u8) -> Self {
        Self {
            pin: None,
            gpio,
            window: DEFAULT_WINDOW,
            window_start: None,
            last_level: None,
            transitions: 0,
            frequency: 0.0,
        }
    }

    /// Claim `gpio` from `chip`. A failed claim is logged and yields an
    /// inactive meter instead of an error.
    pub fn claim<C>(chip: &mut C, gpio: u8) -> Self
    where
        C: GpioChip<Input = P>,
    {
        match chip.claim_input(gpio) {
            Ok(pin) => {
                info!("Moisture probe attached on GPIO {}", gpio);
                Self::new(pin, gpio)
            }
            Err(e) => {
                error!("Failed to claim moisture probe on GPIO {}: {:?}", gpio, e);
                Self::inactive(gpio)
            }
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = if window < MIN_WINDOW { MIN_WINDOW } else { window };
        self
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Hand the pin back to `chip`.
    pub fn release<C>(mut self, chip: &mut C)
    where
        C: GpioChip<Input = P>,
    {
        if self.pin.take().is_some() {
            chip.release(self.gpio);
        }
    }
}

impl<P: InputPin> FrequencyMeter for PolledMeter<P> {
    fn sample(&mut self, now: Instant) -> f32 {
        let Some(pin) = self.pin.as_mut() else {
            return 0.0;
        };

        let start = *self.window_start.get_or_insert(now);

        match pin.is_high() {
            Ok(level) => {
                if self.last_level.is_some_and(|prev| prev != level) {
                    self.transitions += 1;
                }
                self.last_level = Some(level);
            }
            Err(e) => debug!("Failed to read GPIO {}: {:?}", self.gpio, e),
        }

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= self.window {
            // Sampling stalled for more than a window: the count is not
            // representative of either window.
            self.frequency = if elapsed > self.window * 2 {
                0.0
            } else {
                self.transitions as f32 * 1_000_000.0 / self.window.as_micros() as f32
            };
            self.transitions = 0;
            self.window_start = Some(now);
        }

        self.frequency
    }

    fn frequency(&self) -> f32 {
        self.frequency
    }

    fn is_active(&self) -> bool {
        self.pin.is_some()
    }
}
