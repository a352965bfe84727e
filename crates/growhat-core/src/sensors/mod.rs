//! Moisture sensing
//!
//! The Grow HAT probes are capacitive oscillators: wetter soil changes the
//! output frequency. A [`FrequencyMeter`] turns the probe's digital output into
//! a frequency in Hz and a [`SaturationModel`] maps that onto 0.0..=1.0.

pub mod calibration;
mod edge;
mod polled;
mod saturation;

pub use edge::{EdgeCapture, EdgeMeter, STALE_TIMEOUT};
pub use polled::{DEFAULT_WINDOW, PolledMeter};
pub use saturation::SaturationModel;

use embassy_time::Instant;

/// Estimates the frequency of a probe's output.
///
/// Implementations never fail after construction. A meter whose pin could not
/// be claimed reports `is_active() == false` and reads 0 Hz forever.
pub trait FrequencyMeter {
    /// Take a reading at `now` and return the current estimate in Hz.
    fn sample(&mut self, now: Instant) -> f32;

    /// The last estimate, without touching the hardware.
    fn frequency(&self) -> f32;

    fn is_active(&self) -> bool;
}
