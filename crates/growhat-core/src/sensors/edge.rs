use core::cell::Cell;

use critical_section::Mutex;
use embassy_time::{Duration, Instant};
use log::{error, info};

use super::FrequencyMeter;
use crate::gpio::GpioChip;

/// A probe that has produced no edge for longer than this reads 0 Hz
pub const STALE_TIMEOUT: Duration = Duration::from_micros(1_000_000);

#[derive(Debug, Clone, Copy)]
struct EdgeState {
    last_edge: Option<Instant>,
    frequency: f32,
}

/// Edge timestamps shared with the GPIO notification context.
///
/// The notification handler calls [`record_edge`](Self::record_edge) on every
/// rising edge; the polling side reads the result through an [`EdgeMeter`].
///
/// ```rust,ignore
/// static PROBE_1: EdgeCapture = EdgeCapture::new();
///
/// // in the GPIO interrupt handler
/// PROBE_1.record_edge(Instant::now());
/// ```
pub struct EdgeCapture {
    state: Mutex<Cell<EdgeState>>,
}

impl EdgeCapture {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(EdgeState {
                last_edge: None,
                frequency: 0.0,
            })),
        }
    }

    /// Record a rising edge seen at `at`.
    pub fn record_edge(&self, at: Instant) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            if let Some(previous) = state.last_edge {
                let delta_us = at.saturating_duration_since(previous).as_micros();
                if delta_us > 0 {
                    state.frequency = 1_000_000.0 / delta_us as f32;
                }
            }
            state.last_edge = Some(at);
            cell.set(state);
        });
    }

    fn snapshot(&self) -> EdgeState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }
}

impl Default for EdgeCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-triggered frequency meter reading from an [`EdgeCapture`]
pub struct EdgeMeter<'a> {
    capture: &'a EdgeCapture,
    gpio: u8,
    active: bool,
    frequency: f32,
}

impl<'a> EdgeMeter<'a> {
    pub fn new(capture: &'a EdgeCapture, gpio: u8, active: bool) -> Self {
        Self {
            capture,
            gpio,
            active,
            frequency: 0.0,
        }
    }

    /// Claim `gpio` as an input for the notification handler.
    ///
    /// The returned pin is meant to be handed to whatever delivers edge
    /// notifications into `capture`. On failure the meter is inactive and no
    /// pin is returned.
    pub fn claim<C: GpioChip>(
        chip: &mut C,
        gpio: u8,
        capture: &'a EdgeCapture,
    ) -> (Self, Option<C::Input>) {
        match chip.claim_input(gpio) {
            Ok(pin) => {
                info!("Moisture probe attached on GPIO {} (edge capture)", gpio);
                (Self::new(capture, gpio, true), Some(pin))
            }
            Err(e) => {
                error!("Failed to claim moisture probe on GPIO {}: {:?}", gpio, e);
                (Self::new(capture, gpio, false), None)
            }
        }
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }
}

impl FrequencyMeter for EdgeMeter<'_> {
    fn sample(&mut self, now: Instant) -> f32 {
        if !self.active {
            return 0.0;
        }

        let state = self.capture.snapshot();
        self.frequency = match state.last_edge {
            Some(edge) if now.saturating_duration_since(edge) <= STALE_TIMEOUT => state.frequency,
            _ => 0.0,
        };
        self.frequency
    }

    fn frequency(&self) -> f32 {
        self.frequency
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChip;

    #[test]
    fn test_frequency_from_edge_spacing() {
        let capture = EdgeCapture::new();
        let mut meter = EdgeMeter::new(&capture, 23, true);

        assert_eq!(meter.sample(Instant::from_millis(0)), 0.0);

        capture.record_edge(Instant::from_millis(0));
        // One edge is not enough to measure anything
        assert_eq!(meter.sample(Instant::from_millis(10)), 0.0);

        capture.record_edge(Instant::from_millis(50));
        assert_eq!(meter.sample(Instant::from_millis(60)), 20.0);
    }

    #[test]
    fn test_stale_after_one_second() {
        let capture = EdgeCapture::new();
        let mut meter = EdgeMeter::new(&capture, 23, true);

        capture.record_edge(Instant::from_micros(0));
        capture.record_edge(Instant::from_micros(100_000));

        assert_eq!(meter.sample(Instant::from_micros(1_100_000)), 10.0);
        assert_eq!(meter.sample(Instant::from_micros(1_100_001)), 0.0);
        assert_eq!(meter.frequency(), 0.0);
    }

    #[test]
    fn test_static_capture() {
        static CAPTURE: EdgeCapture = EdgeCapture::new();

        CAPTURE.record_edge(Instant::from_millis(1000));
        CAPTURE.record_edge(Instant::from_millis(1040));
        let mut meter = EdgeMeter::new(&CAPTURE, 25, true);
        assert_eq!(meter.sample(Instant::from_millis(1040)), 25.0);
    }

    #[test]
    fn test_failed_claim_is_inactive() {
        let capture = EdgeCapture::new();
        let mut chip = MockChip::new().without(8);

        let (mut meter, pin) = EdgeMeter::claim(&mut chip, 8, &capture);
        assert!(pin.is_none());
        assert!(!meter.is_active());

        capture.record_edge(Instant::from_millis(0));
        capture.record_edge(Instant::from_millis(10));
        assert_eq!(meter.sample(Instant::from_millis(10)), 0.0);
    }
}
