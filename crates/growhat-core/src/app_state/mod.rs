//! Application-wide state, the tick cycle and error types for growhat

mod snapshot;

pub use snapshot::*;

use embassy_time::Instant;
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, error, info};
use thiserror_no_std::Error;

use crate::actuators::{BeepBurst, DoseRequest, Piezo, Pump, PumpError};
use crate::alarm::AlarmAggregator;
use crate::board::CHANNEL_COUNT;
use crate::channel::{Channel, ChannelState};
use crate::config::{Editable, FieldValue, GeneralField, GeneralSettings, Settings};
use crate::gpio::GpioError;
use crate::input::Debouncer;
use crate::sensors::FrequencyMeter;
use crate::storage::SettingsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    Running,
    /// Outputs switched off for exit
    Stopped,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("GPIO error: {0}")]
    Gpio(GpioError),
    #[error("Pump error: {0}")]
    Pump(PumpError),
    #[error("Settings error: {0}")]
    Settings(SettingsError),
    #[error("No channel {0}")]
    NoSuchChannel(u8),
}

impl From<GpioError> for AppError {
    fn from(e: GpioError) -> Self {
        AppError::Gpio(e)
    }
}

impl From<PumpError> for AppError {
    fn from(e: PumpError) -> Self {
        AppError::Pump(e)
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::Settings(e)
    }
}

/// What happened during one [`AppState::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Channels (1-based) whose saturation is below their warn level
    pub alarming: heapless::Vec<u8, CHANNEL_COUNT>,
    /// Channels that started an automatic dose
    pub dosed: heapless::Vec<u8, CHANNEL_COUNT>,
    /// Alarm burst started this tick
    pub burst: Option<BeepBurst>,
    pub lights_out: bool,
    /// The display should be blanked
    pub blank_display: bool,
}

/// Main application state container
///
/// Owns the three channels, the alarm and its buzzer. The periodic driver
/// calls [`tick`](Self::tick) at the tick rate and
/// [`poll_sensors`](Self::poll_sensors) as often as it can in between.
/// Display and HTTP collaborators read state through
/// [`snapshot`](Self::snapshot) and the accessors; they never drive it.
pub struct AppState<M, P, Z>
where
    M: FrequencyMeter,
    P: Pump,
    Z: SetDutyCycle,
{
    pub run_state: AppRunState,
    channels: [Channel<M, P>; CHANNEL_COUNT],
    alarm: AlarmAggregator,
    piezo: Option<Piezo<Z>>,
    general: GeneralSettings,
    snooze_button: Debouncer,
}

impl<M, P, Z> AppState<M, P, Z>
where
    M: FrequencyMeter,
    P: Pump,
    Z: SetDutyCycle,
{
    /// Create the app state at `now` and apply `settings` to every channel.
    pub fn new(
        channels: [Channel<M, P>; CHANNEL_COUNT],
        piezo: Option<Piezo<Z>>,
        settings: &Settings,
        now: Instant,
    ) -> Self {
        let mut state = Self {
            run_state: AppRunState::Uninitialized,
            channels,
            alarm: AlarmAggregator::new(
                settings.general.alarm_enable,
                settings.general.alarm_interval(),
                now,
            ),
            piezo,
            general: settings.general,
            snooze_button: Debouncer::default(),
        };
        state.apply_settings(settings);
        state
    }

    /// Resolve every channel's state and start settling. Returns the number
    /// of active channels.
    pub fn start(&mut self, now: Instant) -> usize {
        let mut active = 0;
        for channel in self.channels.iter_mut() {
            if channel.initialize() == ChannelState::Active {
                active += 1;
            }
            channel.settle(now);
        }
        info!("{} of {} channels active", active, CHANNEL_COUNT);
        self.run_state = AppRunState::Running;
        active
    }

    /// Sample the probes and service outputs between ticks.
    pub fn poll_sensors(&mut self, now: Instant) {
        if self.run_state != AppRunState::Running {
            return;
        }
        for channel in self.channels.iter_mut() {
            channel.poll_sensor(now);
        }
        if let Some(piezo) = self.piezo.as_mut() {
            piezo.service(now);
        }
    }

    /// Run one update cycle. `lux` is the ambient light level, if a light
    /// sensor is fitted.
    pub fn tick(&mut self, now: Instant, lux: Option<f32>) -> TickReport {
        let mut report = TickReport::default();
        if self.run_state != AppRunState::Running {
            debug!("Tick skipped in state {:?}", self.run_state);
            return report;
        }

        report.lights_out = self.general.lights_out(lux);
        report.blank_display = report.lights_out && self.general.black_screen_when_light_low;

        for channel in self.channels.iter_mut() {
            let update = channel.update(now);
            if update.alarm {
                self.alarm.trigger();
                report.alarming.push(channel.index()).ok();
            }
            if update.dosed {
                report.dosed.push(channel.index()).ok();
            }
        }

        report.burst = self.alarm.update(now, report.lights_out);
        if let Some(piezo) = self.piezo.as_mut() {
            match report.burst {
                Some(burst) => piezo.play(burst, now),
                None => piezo.service(now),
            }
        }

        report
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        for (channel, channel_settings) in self.channels.iter_mut().zip(settings.channels.iter()) {
            channel.apply_settings(*channel_settings);
        }
        self.apply_general(settings.general);
    }

    fn apply_general(&mut self, general: GeneralSettings) {
        self.general = general;
        self.alarm.set_enabled(general.alarm_enable);
        self.alarm.set_interval(general.alarm_interval());
    }

    /// Current settings of every channel and the general section
    pub fn settings(&self) -> Settings {
        Settings {
            channels: core::array::from_fn(|i| self.channels[i].settings()),
            general: self.general,
        }
    }

    /// Set a general field through the edit schema.
    pub fn edit_general(&mut self, field: GeneralField, value: FieldValue) -> FieldValue {
        let mut general = self.general;
        let stored = general.set(field, value);
        self.apply_general(general);
        stored
    }

    /// Step a general field through the edit schema.
    pub fn step_general(&mut self, field: GeneralField, up: bool) -> FieldValue {
        let mut general = self.general;
        let stored = general.step(field, up);
        self.apply_general(general);
        stored
    }

    /// Snooze button press. Returns whether the alarm is now sleeping, or
    /// `None` if the press was contact bounce.
    pub fn snooze_button(&mut self, now: Instant) -> Option<bool> {
        if !self.snooze_button.accept(now) {
            return None;
        }
        Some(self.alarm.toggle_snooze(now))
    }

    /// Dose channel `index` (1-based) on request.
    pub fn manual_dose(
        &mut self,
        index: u8,
        request: DoseRequest,
        now: Instant,
    ) -> Result<(), AppError> {
        let channel = self
            .channel_mut(index)
            .ok_or(AppError::NoSuchChannel(index))?;
        channel.manual_dose(request, now)?;
        Ok(())
    }

    /// Switch every pump and the piezo off before exit. Ticks do nothing
    /// afterwards.
    pub fn shutdown(&mut self) {
        info!("Shutting down, switching outputs off");
        for channel in self.channels.iter_mut() {
            if let Err(e) = channel.pump_mut().stop() {
                error!("Failed to stop pump on channel {}: {:?}", channel.index(), e);
            }
        }
        if let Some(piezo) = self.piezo.as_mut() {
            piezo.silence();
        }
        self.run_state = AppRunState::Stopped;
    }

    /// Channel `index` (1-based)
    pub fn channel(&self, index: u8) -> Option<&Channel<M, P>> {
        self.channels.iter().find(|channel| channel.index() == index)
    }

    pub fn channel_mut(&mut self, index: u8) -> Option<&mut Channel<M, P>> {
        self.channels
            .iter_mut()
            .find(|channel| channel.index() == index)
    }

    pub fn channels(&self) -> &[Channel<M, P>; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn alarm(&self) -> &AlarmAggregator {
        &self.alarm
    }

    pub fn alarm_mut(&mut self) -> &mut AlarmAggregator {
        &mut self.alarm
    }

    pub fn general(&self) -> &GeneralSettings {
        &self.general
    }

    pub fn snapshot(&self, now: Instant) -> SystemSnapshot {
        SystemSnapshot {
            channels: self.channels.iter().map(Channel::snapshot).collect(),
            alarm_sleeping: self.alarm.sleeping(now),
        }
    }
}
