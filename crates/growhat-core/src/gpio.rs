//! GPIO capability shared by every channel
//!
//! The process acquires one [`GpioChip`] at startup and lends it to channels
//! while they are built. The chip tracks which pins are claimed so a second
//! claim of the same line fails loudly instead of two owners fighting over it.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::pwm::{self, ErrorKind, SetDutyCycle};
use thiserror_no_std::Error;

/// Highest BCM pin number the claim tracker can represent
pub const MAX_PIN: u8 = 63;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    #[error("GPIO {0} is already in use")]
    PinInUse(u8),
    #[error("GPIO {0} is not available on this chip")]
    Unavailable(u8),
    #[error("I/O error on GPIO {0}")]
    Io(u8),
}

/// Set of claimed pins, one bit per BCM number
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PinClaims {
    mask: u64,
}

impl PinClaims {
    pub const fn new() -> Self {
        Self { mask: 0 }
    }

    /// Mark `pin` as claimed.
    pub fn claim(&mut self, pin: u8) -> Result<(), GpioError> {
        if pin > MAX_PIN {
            return Err(GpioError::Unavailable(pin));
        }
        let bit = 1u64 << pin;
        if self.mask & bit != 0 {
            return Err(GpioError::PinInUse(pin));
        }
        self.mask |= bit;
        Ok(())
    }

    /// Free `pin`. Releasing an unclaimed pin is a no-op.
    pub fn release(&mut self, pin: u8) {
        if pin <= MAX_PIN {
            self.mask &= !(1u64 << pin);
        }
    }

    pub fn is_claimed(&self, pin: u8) -> bool {
        pin <= MAX_PIN && self.mask & (1u64 << pin) != 0
    }
}

/// A GPIO controller that hands out pins by BCM number
pub trait GpioChip {
    type Input: InputPin;
    type Output: OutputPin;

    /// Claim `pin` as an input.
    fn claim_input(&mut self, pin: u8) -> Result<Self::Input, GpioError>;

    /// Claim `pin` as an output driven to `initial`.
    fn claim_output(&mut self, pin: u8, initial: PinState) -> Result<Self::Output, GpioError>;

    /// Return `pin` to the chip.
    fn release(&mut self, pin: u8);
}

/// Error from a [`DigitalDrive`], wrapping the pin's own error
#[derive(Debug)]
pub struct DriveError<E>(pub E);

impl<E: core::fmt::Debug> pwm::Error for DriveError<E> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Presents a plain on/off output as a duty-cycle drive.
///
/// The Grow HAT switches its pumps through plain GPIO lines, so any non-zero
/// duty turns the output on. This lets the pump actuator treat GPIO and PWM
/// drives the same way.
pub struct DigitalDrive<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> DigitalDrive<P> {
    pub const MAX_DUTY: u16 = 255;

    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Give the underlying pin back, e.g. to release it to the chip.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> pwm::ErrorType for DigitalDrive<P> {
    type Error = DriveError<P::Error>;
}

impl<P: OutputPin> SetDutyCycle for DigitalDrive<P> {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let state = PinState::from(duty > 0);
        self.pin.set_state(state).map_err(DriveError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChip, MockOutput};

    #[test]
    fn test_double_claim_fails() {
        let mut claims = PinClaims::new();
        assert_eq!(claims.claim(17), Ok(()));
        assert_eq!(claims.claim(17), Err(GpioError::PinInUse(17)));
        assert!(claims.is_claimed(17));

        claims.release(17);
        assert!(!claims.is_claimed(17));
        assert_eq!(claims.claim(17), Ok(()));
    }

    #[test]
    fn test_out_of_range_pin() {
        let mut claims = PinClaims::new();
        assert_eq!(claims.claim(64), Err(GpioError::Unavailable(64)));
        assert!(!claims.is_claimed(64));
    }

    #[test]
    fn test_chip_rejects_second_owner() {
        let mut chip = MockChip::new();
        assert!(chip.claim_input(23).is_ok());
        assert!(matches!(chip.claim_output(23, PinState::Low), Err(GpioError::PinInUse(23))));

        chip.release(23);
        assert!(chip.claim_output(23, PinState::Low).is_ok());
    }

    #[test]
    fn test_digital_drive_any_duty_is_on() {
        let out = MockOutput::new();
        let mut drive = DigitalDrive::new(out.clone());

        drive.set_duty_cycle(1).unwrap();
        assert!(out.is_high());

        drive.set_duty_cycle(0).unwrap();
        assert!(!out.is_high());

        drive.set_duty_cycle_fully_on().unwrap();
        assert!(out.is_high());
    }
}
