//! Pump and piezo outputs

mod piezo;
mod pump;

pub use piezo::{BEEP_LENGTH, BEEP_OFFSETS, BeepBurst, Piezo};
pub use pump::{OFF_RETRY, PumpActuator, PumpCommand, PumpLink, PumpSignal, run_pump};

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::timing::{as_secs_f32, secs_f32};

/// Longest dose a single request can ask for
pub const MAX_DOSE: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpError {
    #[error("Failed to drive pump output")]
    Drive,
    #[error("No pump output attached")]
    Detached,
}

/// A single timed pump activation.
///
/// Serialized as `{ "speed": .., "duration": .. }` with the duration in
/// seconds, the shape of the pump request accepted over HTTP. Out of range
/// values are clamped when read, so a deserialized request is always safe to
/// act on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseRequest {
    speed: f32,
    #[serde(rename = "duration")]
    duration_secs: f32,
}

impl DoseRequest {
    pub fn new(speed: f32, duration: Duration) -> Self {
        Self::from_secs(speed, as_secs_f32(duration))
    }

    pub fn from_secs(speed: f32, duration_secs: f32) -> Self {
        let request = Self {
            speed,
            duration_secs,
        };
        Self {
            speed: request.speed(),
            duration_secs: as_secs_f32(request.duration()),
        }
    }

    /// Drive strength, 0.0..=1.0
    pub fn speed(&self) -> f32 {
        if self.speed.is_nan() {
            return 0.0;
        }
        self.speed.clamp(0.0, 1.0)
    }

    /// How long the output stays on, at most [`MAX_DOSE`]
    pub fn duration(&self) -> Duration {
        secs_f32(self.duration_secs).min(MAX_DOSE)
    }

    /// A request that would not move any water
    pub fn is_empty(&self) -> bool {
        self.speed() == 0.0 || self.duration() == Duration::from_ticks(0)
    }
}

/// Something that can deliver a dose
pub trait Pump {
    /// Start a non-blocking dose. A newer dose replaces a running one.
    fn dose(&mut self, request: DoseRequest, now: Instant) -> Result<(), PumpError>;

    /// Turn the output off if the running dose has ended. Pumps timed
    /// elsewhere have nothing to do here.
    fn service(&mut self, _now: Instant) -> Result<(), PumpError> {
        Ok(())
    }

    /// End any running dose now.
    fn stop(&mut self) -> Result<(), PumpError>;

    /// Whether an output is attached
    fn is_active(&self) -> bool {
        true
    }
}
