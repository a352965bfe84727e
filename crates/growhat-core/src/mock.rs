//! Test doubles for pins, drives, meters and pumps

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use embassy_time::Instant;
use embedded_hal::digital::{self, InputPin, OutputPin, PinState};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::actuators::{DoseRequest, Pump, PumpError};
use crate::gpio::{GpioChip, GpioError, PinClaims};
use crate::sensors::FrequencyMeter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl digital::Error for MockError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl pwm::Error for MockError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockInput {
    level: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl MockInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, high: bool) {
        self.level.set(high);
    }

    pub fn toggle(&self) {
        self.level.set(!self.level.get());
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl digital::ErrorType for MockInput {
    type Error = MockError;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.fail.get() {
            return Err(MockError);
        }
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    high: Rc<Cell<bool>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high.get()
    }
}

impl digital::ErrorType for MockOutput {
    type Error = MockError;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.set(true);
        Ok(())
    }
}

/// Duty-cycle drive that records every write
#[derive(Debug, Clone, Default)]
pub struct MockDrive {
    duty: Rc<Cell<u16>>,
    writes: Rc<RefCell<Vec<u16>>>,
    fail_on_nonzero: Rc<Cell<bool>>,
    failing_offs: Rc<Cell<u32>>,
}

impl MockDrive {
    pub const MAX: u16 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }

    pub fn writes(&self) -> Vec<u16> {
        self.writes.borrow().clone()
    }

    /// Make every write of a non-zero duty fail.
    pub fn fail_on_nonzero(&self, fail: bool) {
        self.fail_on_nonzero.set(fail);
    }

    /// Make the next `count` writes of zero duty fail.
    pub fn fail_next_off(&self, count: u32) {
        self.failing_offs.set(count);
    }
}

impl pwm::ErrorType for MockDrive {
    type Error = MockError;
}

impl SetDutyCycle for MockDrive {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if duty > 0 && self.fail_on_nonzero.get() {
            return Err(MockError);
        }
        if duty == 0 && self.failing_offs.get() > 0 {
            self.failing_offs.set(self.failing_offs.get() - 1);
            return Err(MockError);
        }
        self.duty.set(duty);
        self.writes.borrow_mut().push(duty);
        Ok(())
    }
}

/// GPIO chip whose inputs can be driven from the test
#[derive(Debug, Default)]
pub struct MockChip {
    claims: PinClaims,
    inputs: BTreeMap<u8, MockInput>,
    missing: Vec<u8>,
}

impl MockChip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `pin` does not exist on this chip.
    pub fn without(mut self, pin: u8) -> Self {
        self.missing.push(pin);
        self
    }

    /// Handle to the input most recently claimed on `pin`.
    pub fn input(&self, pin: u8) -> MockInput {
        self.inputs.get(&pin).cloned().unwrap_or_default()
    }

    fn check(&mut self, pin: u8) -> Result<(), GpioError> {
        if self.missing.contains(&pin) {
            return Err(GpioError::Unavailable(pin));
        }
        self.claims.claim(pin)
    }
}

impl GpioChip for MockChip {
    type Input = MockInput;
    type Output = MockOutput;

    fn claim_input(&mut self, pin: u8) -> Result<Self::Input, GpioError> {
        self.check(pin)?;
        let input = MockInput::new();
        self.inputs.insert(pin, input.clone());
        Ok(input)
    }

    fn claim_output(&mut self, pin: u8, initial: PinState) -> Result<Self::Output, GpioError> {
        self.check(pin)?;
        let mut output = MockOutput::new();
        output.set_state(initial).map_err(|_| GpioError::Io(pin))?;
        Ok(output)
    }

    fn release(&mut self, pin: u8) {
        self.inputs.remove(&pin);
        self.claims.release(pin);
    }
}

/// Frequency meter with a settable reading
#[derive(Debug, Clone, Default)]
pub struct MockMeter {
    frequency: Rc<Cell<f32>>,
    active: bool,
}

impl MockMeter {
    pub fn active(frequency: f32) -> Self {
        let meter = Self {
            frequency: Rc::default(),
            active: true,
        };
        meter.set(frequency);
        meter
    }

    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn set(&self, frequency: f32) {
        self.frequency.set(frequency);
    }
}

impl FrequencyMeter for MockMeter {
    fn sample(&mut self, _now: Instant) -> f32 {
        self.frequency()
    }

    fn frequency(&self) -> f32 {
        if self.active { self.frequency.get() } else { 0.0 }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Pump that records every dose it is asked for
#[derive(Debug, Clone, Default)]
pub struct MockPump {
    doses: Rc<RefCell<Vec<(DoseRequest, Instant)>>>,
    stops: Rc<Cell<u32>>,
    fail: Rc<Cell<bool>>,
    detached: bool,
}

impl MockPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pump whose output could not be claimed
    pub fn detached() -> Self {
        Self {
            detached: true,
            ..Self::default()
        }
    }

    pub fn stops(&self) -> u32 {
        self.stops.get()
    }

    pub fn doses(&self) -> Vec<(DoseRequest, Instant)> {
        self.doses.borrow().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl Pump for MockPump {
    fn dose(&mut self, request: DoseRequest, now: Instant) -> Result<(), PumpError> {
        self.doses.borrow_mut().push((request, now));
        if self.fail.get() {
            return Err(PumpError::Drive);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PumpError> {
        self.stops.set(self.stops.get() + 1);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.detached
    }
}
