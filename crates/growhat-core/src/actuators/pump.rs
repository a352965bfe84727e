use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, error, info};

use super::{DoseRequest, Pump, PumpError};

/// Delay before a pump task retries a failed turn-off
pub const OFF_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpCommand {
    Dose(DoseRequest),
    Stop,
}

/// Latest command for an asynchronous pump task. A command posted while
/// another is waiting replaces it.
pub type PumpSignal = Signal<CriticalSectionRawMutex, PumpCommand>;

/// Drives one pump output for bounded doses.
///
/// A non-blocking [`dose`](Self::dose) switches the output on and arms a
/// deadline; [`service`](Self::service) switches it off once the deadline has
/// passed. A dose issued while another runs replaces the deadline, so the
/// output goes off exactly once, at the end of the newest dose.
///
/// A failed turn-off keeps the deadline armed, so the next
/// [`service`](Self::service) tries again. The output is forced off when the
/// actuator is dropped.
pub struct PumpActuator<D: SetDutyCycle> {
    drive: D,
    gpio: u8,
    off_at: Option<Instant>,
}

impl<D: SetDutyCycle> PumpActuator<D> {
    pub fn new(drive: D, gpio: u8) -> Self {
        Self {
            drive,
            gpio,
            off_at: None,
        }
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    /// When the running dose ends, if one is running
    pub fn deadline(&self) -> Option<Instant> {
        self.off_at
    }

    /// The output may be on: a dose runs or a turn-off is still owed.
    pub fn is_running(&self) -> bool {
        self.off_at.is_some()
    }

    fn duty_for(&self, speed: f32) -> u16 {
        let max = self.drive.max_duty_cycle();
        let duty = speed * max as f32 + 0.5;
        if duty >= max as f32 { max } else { duty as u16 }
    }

    /// Switch the output on for `request`, without waiting for it to end.
    pub fn dose(&mut self, request: DoseRequest, now: Instant) -> Result<(), PumpError> {
        let duty = self.duty_for(request.speed());
        let duration = request.duration();
        if duty == 0 || duration == Duration::from_ticks(0) {
            debug!("Ignoring empty dose on GPIO {}", self.gpio);
            return Ok(());
        }

        if let Err(e) = self.drive.set_duty_cycle(duty) {
            error!("Failed to start pump on GPIO {}: {:?}", self.gpio, e);
            self.force_off();
            return Err(PumpError::Drive);
        }

        debug!(
            "Pump on GPIO {} running at duty {} for {} ms",
            self.gpio,
            duty,
            duration.as_millis()
        );
        self.off_at = Some(now + duration);
        Ok(())
    }

    /// Run `request` to completion, blocking on `delay`.
    pub fn dose_blocking(
        &mut self,
        request: DoseRequest,
        delay: &mut impl DelayNs,
    ) -> Result<(), PumpError> {
        let duty = self.duty_for(request.speed());
        let duration = request.duration();
        if duty == 0 || duration == Duration::from_ticks(0) {
            return Ok(());
        }

        if let Err(e) = self.drive.set_duty_cycle(duty) {
            error!("Failed to start pump on GPIO {}: {:?}", self.gpio, e);
            self.force_off();
            return Err(PumpError::Drive);
        }
        delay.delay_ms(duration.as_millis() as u32);
        self.stop()
    }

    /// Switch the output off if the running dose has ended. Returns whether
    /// the output was switched off by this call.
    pub fn service(&mut self, now: Instant) -> Result<bool, PumpError> {
        match self.off_at {
            Some(deadline) if now >= deadline => {
                self.turn_off()?;
                self.off_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// End any running dose now. On failure the turn-off stays owed and
    /// is retried by the next [`service`](Self::service).
    pub fn stop(&mut self) -> Result<(), PumpError> {
        match self.turn_off() {
            Ok(()) => {
                self.off_at = None;
                Ok(())
            }
            Err(e) => {
                self.off_at = Some(Instant::MIN);
                Err(e)
            }
        }
    }

    fn turn_off(&mut self) -> Result<(), PumpError> {
        self.drive.set_duty_cycle_fully_off().map_err(|e| {
            error!("Failed to stop pump on GPIO {}: {:?}", self.gpio, e);
            PumpError::Drive
        })
    }

    fn force_off(&mut self) {
        self.stop().ok();
    }
}

impl<D: SetDutyCycle> Pump for PumpActuator<D> {
    fn dose(&mut self, request: DoseRequest, now: Instant) -> Result<(), PumpError> {
        PumpActuator::dose(self, request, now)
    }

    fn service(&mut self, now: Instant) -> Result<(), PumpError> {
        PumpActuator::service(self, now).map(|_| ())
    }

    fn stop(&mut self) -> Result<(), PumpError> {
        PumpActuator::stop(self)
    }
}

impl<D: SetDutyCycle> Drop for PumpActuator<D> {
    fn drop(&mut self) {
        self.force_off();
    }
}

/// Hands doses to a [`run_pump`] task through a [`PumpSignal`]
#[derive(Clone, Copy)]
pub struct PumpLink<'a> {
    signal: &'a PumpSignal,
    attached: bool,
}

impl<'a> PumpLink<'a> {
    /// Link to a running pump task
    pub fn new(signal: &'a PumpSignal) -> Self {
        Self {
            signal,
            attached: true,
        }
    }

    /// Link for a pump whose output could not be claimed. Doses are refused.
    pub fn detached(signal: &'a PumpSignal) -> Self {
        Self {
            signal,
            attached: false,
        }
    }
}

impl Pump for PumpLink<'_> {
    fn dose(&mut self, request: DoseRequest, _now: Instant) -> Result<(), PumpError> {
        if !self.attached {
            return Err(PumpError::Detached);
        }
        if !request.is_empty() {
            self.signal.signal(PumpCommand::Dose(request));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PumpError> {
        if self.attached {
            self.signal.signal(PumpCommand::Stop);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.attached
    }
}

/// Pump task: runs every command posted to `commands` on `pump`.
///
/// The turn-off is timed with an embassy timer. A dose arriving while another
/// runs restarts it with the new parameters. A failed turn-off is retried
/// every [`OFF_RETRY`] until it succeeds.
pub async fn run_pump<D: SetDutyCycle>(mut pump: PumpActuator<D>, commands: &PumpSignal) -> ! {
    info!("Pump task for GPIO {} started", pump.gpio());
    let mut next = Some(commands.wait().await);

    loop {
        match next.take() {
            // Failures are logged; a failed start leaves the output off
            Some(PumpCommand::Dose(request)) => {
                pump.dose(request, Instant::now()).ok();
            }
            Some(PumpCommand::Stop) => {
                info!("Stopping pump on GPIO {}", pump.gpio());
                pump.stop().ok();
            }
            None => {}
        }

        next = match pump.deadline() {
            Some(deadline) => match select(Timer::at(deadline), commands.wait()).await {
                Either::First(()) => {
                    if pump.service(Instant::now()).is_err() {
                        Timer::after(OFF_RETRY).await;
                    }
                    None
                }
                Either::Second(command) => Some(command),
            },
            None => Some(commands.wait().await),
        };
    }
}
