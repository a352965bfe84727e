//! Simulated Grow HAT hardware
//!
//! Three soil beds dry out over time and get wetter while their pump runs.
//! Each bed's probe toggles its output at a rate set by the bed's moisture,
//! scaled so the default calibration points read 0% and 100%. Ambient light
//! follows a compressed day so lights-out handling can be watched.

use std::sync::{Arc, Mutex, MutexGuard};

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{self, InputPin, OutputPin, PinState};
use log::{debug, info};

use growhat_core::board::{CHANNEL_COUNT, MOISTURE_PINS, PIEZO_PIN, PUMP_PINS};
use growhat_core::config::ChannelSettings;
use growhat_core::gpio::{GpioChip, GpioError, PinClaims};

// ---------------------------------------------------------------------------
// Soil model
// ---------------------------------------------------------------------------

/// Saturation lost per second by an unwatered bed
const DRYING_PER_SEC: f32 = 0.002;

/// Saturation gained per second of pumping at full speed
const WATERING_PER_SEC: f32 = 0.3;

/// Length of one simulated day
const DAY_LENGTH: Duration = Duration::from_secs(600);

/// Brightest midday light level in lux
const PEAK_LUX: f32 = 400.0;

#[derive(Debug, Clone, Copy)]
struct Bed {
    saturation: f32,
    pump_on: bool,
    probe_fitted: bool,
}

pub struct Garden {
    beds: [Bed; CHANNEL_COUNT],
    piezo_on: bool,
    last_update: Option<Instant>,
}

pub type SharedGarden = Arc<Mutex<Garden>>;

impl Garden {
    /// Beds start at staggered moisture levels. `missing_probe` (0-based)
    /// leaves one bed without a probe.
    pub fn shared(missing_probe: Option<usize>) -> SharedGarden {
        let beds = core::array::from_fn(|i| Bed {
            saturation: 0.35 + 0.2 * i as f32,
            pump_on: false,
            probe_fitted: missing_probe != Some(i),
        });
        Arc::new(Mutex::new(Self {
            beds,
            piezo_on: false,
            last_update: None,
        }))
    }

    /// Move the soil model forward to `now`.
    pub fn advance(&mut self, now: Instant) {
        let Some(last) = self.last_update.replace(now) else {
            return;
        };
        let dt = now.saturating_duration_since(last).as_micros() as f32 / 1_000_000.0;

        for bed in self.beds.iter_mut() {
            bed.saturation -= DRYING_PER_SEC * dt;
            if bed.pump_on {
                bed.saturation += WATERING_PER_SEC * dt;
            }
            bed.saturation = bed.saturation.clamp(0.0, 1.0);
        }
    }

    /// Ambient light level at `now`
    pub fn lux(&self, now: Instant) -> f32 {
        let phase = (now.as_micros() % DAY_LENGTH.as_micros()) as f32 / DAY_LENGTH.as_micros() as f32;
        let daylight = (phase * core::f32::consts::TAU).sin();
        (daylight * PEAK_LUX).max(0.0)
    }

    pub fn saturation(&self, bed: usize) -> f32 {
        self.beds[bed].saturation
    }

    /// Probe output transitions per second for `bed`
    fn probe_rate(&self, bed: usize) -> f32 {
        let calibration = ChannelSettings::default();
        let saturation = self.beds[bed].saturation;
        calibration.dry_point + (calibration.wet_point - calibration.dry_point) * saturation
    }

    fn probe_level(&self, bed: usize, now: Instant) -> bool {
        let t = now.as_micros() as f64 / 1_000_000.0;
        let transitions = (t * f64::from(self.probe_rate(bed))) as u64;
        transitions % 2 == 1
    }

    fn set_output(&mut self, target: OutputTarget, on: bool) {
        match target {
            OutputTarget::Pump(bed) => {
                if self.beds[bed].pump_on != on {
                    debug!("Pump {} {}", bed + 1, if on { "on" } else { "off" });
                }
                self.beds[bed].pump_on = on;
            }
            OutputTarget::Piezo => {
                if on && !self.piezo_on {
                    info!("*beep*");
                }
                self.piezo_on = on;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

/// The simulated garden's lock was poisoned by a panicking thread
#[derive(Debug, Clone, Copy)]
pub struct SimError;

impl digital::Error for SimError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

fn lock(garden: &SharedGarden) -> Result<MutexGuard<'_, Garden>, SimError> {
    garden.lock().map_err(|_| SimError)
}

/// Output of one bed's moisture probe
pub struct SimProbe {
    garden: SharedGarden,
    bed: usize,
}

impl digital::ErrorType for SimProbe {
    type Error = SimError;
}

impl InputPin for SimProbe {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(lock(&self.garden)?.probe_level(self.bed, Instant::now()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputTarget {
    Pump(usize),
    Piezo,
}

/// A pump or piezo line
pub struct SimOutput {
    garden: SharedGarden,
    target: OutputTarget,
}

impl digital::ErrorType for SimOutput {
    type Error = SimError;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        lock(&self.garden)?.set_output(self.target, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        lock(&self.garden)?.set_output(self.target, true);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chip
// ---------------------------------------------------------------------------

/// GPIO chip wired to the simulated garden
pub struct SimChip {
    garden: SharedGarden,
    claims: PinClaims,
}

impl SimChip {
    pub fn new(garden: SharedGarden) -> Self {
        Self {
            garden,
            claims: PinClaims::new(),
        }
    }
}

impl GpioChip for SimChip {
    type Input = SimProbe;
    type Output = SimOutput;

    fn claim_input(&mut self, pin: u8) -> Result<Self::Input, GpioError> {
        let bed = MOISTURE_PINS
            .iter()
            .position(|p| *p == pin)
            .ok_or(GpioError::Unavailable(pin))?;
        let fitted = lock(&self.garden)
            .map_err(|_| GpioError::Io(pin))?
            .beds[bed]
            .probe_fitted;
        if !fitted {
            return Err(GpioError::Unavailable(pin));
        }

        self.claims.claim(pin)?;
        Ok(SimProbe {
            garden: self.garden.clone(),
            bed,
        })
    }

    fn claim_output(&mut self, pin: u8, initial: PinState) -> Result<Self::Output, GpioError> {
        let target = if pin == PIEZO_PIN {
            OutputTarget::Piezo
        } else {
            let bed = PUMP_PINS
                .iter()
                .position(|p| *p == pin)
                .ok_or(GpioError::Unavailable(pin))?;
            OutputTarget::Pump(bed)
        };

        self.claims.claim(pin)?;
        let mut output = SimOutput {
            garden: self.garden.clone(),
            target,
        };
        if output.set_state(initial).is_err() {
            self.claims.release(pin);
            return Err(GpioError::Io(pin));
        }
        Ok(output)
    }

    fn release(&mut self, pin: u8) {
        self.claims.release(pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pumping_wets_the_bed() {
        let garden = Garden::shared(None);
        let mut chip = SimChip::new(garden.clone());
        let mut pump = chip.claim_output(PUMP_PINS[0], PinState::Low).unwrap();

        let start = Instant::from_secs(100);
        let mut soil = garden.lock().unwrap();
        soil.advance(start);
        let before = soil.saturation(0);
        drop(soil);

        pump.set_high().unwrap();
        let mut soil = garden.lock().unwrap();
        soil.advance(start + Duration::from_secs(1));
        assert!(soil.saturation(0) > before);
        assert!(soil.saturation(1) < 0.55);
    }

    #[test]
    fn test_missing_probe_cannot_be_claimed() {
        let garden = Garden::shared(Some(1));
        let mut chip = SimChip::new(garden);
        assert!(chip.claim_input(MOISTURE_PINS[0]).is_ok());
        assert_eq!(
            chip.claim_input(MOISTURE_PINS[1]).err(),
            Some(GpioError::Unavailable(MOISTURE_PINS[1]))
        );
        assert_eq!(
            chip.claim_input(MOISTURE_PINS[0]).err(),
            Some(GpioError::PinInUse(MOISTURE_PINS[0]))
        );
    }

    #[test]
    fn test_dark_half_of_the_day() {
        let garden = Garden::shared(None);
        let soil = garden.lock().unwrap();
        assert!(soil.lux(Instant::from_secs(150)) > 300.0);
        assert_eq!(soil.lux(Instant::from_secs(450)), 0.0);
    }
}
