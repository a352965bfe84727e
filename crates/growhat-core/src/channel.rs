//! Per-channel watering and alarm policy
//!
//! A [`Channel`] owns one probe meter, one pump and the channel's settings.
//! Every tick it samples the probe, records the saturation and decides
//! whether to water and whether to alarm.

use embassy_time::{Duration, Instant};
use log::{error, info, warn};

use crate::actuators::{DoseRequest, Pump, PumpError};
use crate::config::{ChannelField, ChannelSettings, Editable, FieldValue};
use crate::sensors::FrequencyMeter;
use crate::storage::ReadingHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not yet checked
    Uninitialized,
    /// Probe and pump attached; readings drive watering and alarms
    Active,
    /// Probe or pump missing; the channel never waters or alarms
    Degraded,
}

/// Outcome of one [`Channel::update`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelUpdate {
    pub saturation: f32,
    /// The reading came from a live probe
    pub valid: bool,
    pub alarm: bool,
    pub dosed: bool,
}

pub struct Channel<M: FrequencyMeter, P: Pump> {
    index: u8,
    state: ChannelState,
    settings: ChannelSettings,
    meter: M,
    pump: P,
    history: ReadingHistory,
    last_dose: Option<Instant>,
    alarm: bool,
    moisture: f32,
    saturation: f32,
}

impl<M: FrequencyMeter, P: Pump> Channel<M, P> {
    /// Channel `index` (1-based) in the [`Uninitialized`](ChannelState::Uninitialized) state.
    pub fn new(index: u8, meter: M, pump: P, settings: ChannelSettings) -> Self {
        Self {
            index,
            state: ChannelState::Uninitialized,
            settings,
            meter,
            pump,
            history: ReadingHistory::new(),
            last_dose: None,
            alarm: false,
            moisture: 0.0,
            saturation: 0.0,
        }
    }

    /// Resolve the state from the meter and pump. A channel missing either
    /// is degraded for the rest of the run.
    pub fn initialize(&mut self) -> ChannelState {
        self.state = if !self.meter.is_active() {
            error!("Channel {} has no probe, watering and alarms disabled", self.index);
            ChannelState::Degraded
        } else if !self.pump.is_active() {
            error!("Channel {} has no pump, watering and alarms disabled", self.index);
            ChannelState::Degraded
        } else {
            info!("Channel {} active", self.index);
            ChannelState::Active
        };
        self.state
    }

    /// Treat `now` as the last dose, so automatic watering waits a full
    /// `watering_delay` after startup.
    pub fn settle(&mut self, now: Instant) {
        self.last_dose = Some(now);
    }

    /// Sample the probe between ticks without applying any policy.
    pub fn poll_sensor(&mut self, now: Instant) {
        self.pump.service(now).ok();
        if self.settings.enabled {
            self.meter.sample(now);
        }
    }

    pub fn update(&mut self, now: Instant) -> ChannelUpdate {
        // Logged by the pump; a failed turn-off must not stop the tick
        self.pump.service(now).ok();

        if !self.settings.enabled {
            self.alarm = false;
            self.moisture = 0.0;
            self.saturation = 0.0;
            return self.outcome(false, false);
        }

        let frequency = self.meter.sample(now);
        self.moisture = frequency;
        self.saturation = self.settings.model().saturation(frequency);
        self.history.push(self.saturation);

        let valid =
            self.state == ChannelState::Active && self.meter.is_active() && frequency != 0.0;
        if !valid {
            self.alarm = false;
            return self.outcome(false, false);
        }

        let mut dosed = false;
        if self.settings.auto_water
            && self.saturation < self.settings.water_level
            && self.dose_due(now)
        {
            info!(
                "Watering Channel {} - rate {:.2} for {:.2} sec",
                self.index, self.settings.pump_speed, self.settings.pump_time
            );
            self.last_dose = Some(now);
            match self.pump.dose(self.settings.dose_request(), now) {
                Ok(()) => dosed = true,
                Err(e) => error!("Failed to water channel {}: {:?}", self.index, e),
            }
        }

        let alarm = self.saturation < self.settings.warn_level;
        if alarm && !self.alarm {
            warn!(
                "Alarm on Channel {} - saturation {:.2}% below warn level {:.2}%",
                self.index,
                self.saturation * 100.0,
                self.settings.warn_level * 100.0
            );
        }
        self.alarm = alarm;

        self.outcome(true, dosed)
    }

    fn outcome(&self, valid: bool, dosed: bool) -> ChannelUpdate {
        ChannelUpdate {
            saturation: self.saturation,
            valid,
            alarm: self.alarm,
            dosed,
        }
    }

    fn dose_due(&self, now: Instant) -> bool {
        let delay = self.settings.watering_delay();
        self.last_dose
            .is_none_or(|last| now.saturating_duration_since(last) >= delay)
    }

    /// Run the pump on request, outside the automatic watering policy.
    pub fn manual_dose(&mut self, request: DoseRequest, now: Instant) -> Result<(), PumpError> {
        info!(
            "Manual dose on channel {} - rate {:.2} for {} ms",
            self.index,
            request.speed(),
            request.duration().as_millis()
        );
        self.pump.dose(request, now)
    }

    pub fn apply_settings(&mut self, settings: ChannelSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> ChannelSettings {
        self.settings
    }

    /// Set one field through the edit schema, clamped to its bounds.
    pub fn edit(&mut self, field: ChannelField, value: FieldValue) -> FieldValue {
        self.settings.set(field, value)
    }

    /// Step one field up or down through the edit schema.
    pub fn step(&mut self, field: ChannelField, up: bool) -> FieldValue {
        self.settings.step(field, up)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn set_warn_level(&mut self, level: f32) {
        self.settings.warn_level = level;
    }

    pub fn set_water_level(&mut self, level: f32) {
        self.settings.water_level = level;
    }

    pub fn set_auto_water(&mut self, auto_water: bool) {
        self.settings.auto_water = auto_water;
    }

    /// Stored as given; [`DoseRequest`] clamps the speed when a dose is built.
    pub fn set_pump_speed(&mut self, speed: f32) {
        self.settings.pump_speed = speed;
    }

    pub fn set_pump_time(&mut self, seconds: f32) {
        self.settings.pump_time = seconds;
    }

    pub fn set_watering_delay(&mut self, delay: Duration) {
        self.settings.watering_delay = u32::try_from(delay.as_secs()).unwrap_or(u32::MAX);
    }

    /// Recalibrate the wet end. Takes effect on the next update.
    pub fn set_wet_point(&mut self, frequency: f32) {
        self.settings.wet_point = frequency;
    }

    /// Recalibrate the dry end. Takes effect on the next update.
    pub fn set_dry_point(&mut self, frequency: f32) {
        self.settings.dry_point = frequency;
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    /// Last probe frequency in Hz
    pub fn moisture(&self) -> f32 {
        self.moisture
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn history(&self) -> &ReadingHistory {
        &self.history
    }

    pub fn last_dose(&self) -> Option<Instant> {
        self.last_dose
    }

    pub fn meter(&self) -> &M {
        &self.meter
    }

    pub fn pump(&self) -> &P {
        &self.pump
    }

    pub fn pump_mut(&mut self) -> &mut P {
        &mut self.pump
    }
}
