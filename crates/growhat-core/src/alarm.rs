//! Audible alarm shared by all channels
//!
//! Channels raise the alarm with [`AlarmAggregator::trigger`]; any number of
//! triggers between bursts collapse into one pending alarm. A burst clears the
//! pending state, so a channel that keeps alarming triggers again on the next
//! tick and beeps again one interval later.

use embassy_time::{Duration, Instant};
use log::info;

use crate::actuators::BeepBurst;

/// How long the snooze button silences the alarm
pub const DEFAULT_SNOOZE: Duration = Duration::from_secs(500);

pub struct AlarmAggregator {
    enabled: bool,
    interval: Duration,
    triggered: bool,
    last_burst: Instant,
    sleep_until: Option<Instant>,
}

impl AlarmAggregator {
    /// Create an aggregator at `now`. The first burst waits one full
    /// `interval`, which keeps the alarm quiet while readings settle.
    pub fn new(enabled: bool, interval: Duration, now: Instant) -> Self {
        Self {
            enabled,
            interval,
            triggered: false,
            last_burst: now,
            sleep_until: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Record that some channel is alarming.
    pub fn trigger(&mut self) {
        self.triggered = true;
    }

    /// Whether a trigger is waiting for the next burst
    pub fn pending(&self) -> bool {
        self.triggered
    }

    /// Decide whether to beep at `now`. Returns the burst to play, if any.
    pub fn update(&mut self, now: Instant, lights_out: bool) -> Option<BeepBurst> {
        if let Some(until) = self.sleep_until {
            if now < until {
                return None;
            }
            info!("Alarm snooze ended");
            self.sleep_until = None;
        }

        if !self.enabled || lights_out || !self.triggered {
            return None;
        }
        if now.saturating_duration_since(self.last_burst) < self.interval {
            return None;
        }

        self.last_burst = now;
        self.triggered = false;
        Some(BeepBurst::new(now))
    }

    /// Suppress bursts for `duration` from `now`.
    pub fn sleep(&mut self, now: Instant, duration: Duration) {
        info!("Alarm snoozed for {} s", duration.as_secs());
        self.sleep_until = Some(now + duration);
    }

    pub fn cancel_sleep(&mut self) {
        self.sleep_until = None;
    }

    pub fn sleeping(&self, now: Instant) -> bool {
        self.sleep_until.is_some_and(|until| now < until)
    }

    /// Snooze for [`DEFAULT_SNOOZE`], or end a running snooze. Returns whether
    /// the alarm is now sleeping.
    pub fn toggle_snooze(&mut self, now: Instant) -> bool {
        if self.sleeping(now) {
            info!("Alarm snooze cancelled");
            self.cancel_sleep();
            false
        } else {
            self.sleep(now, DEFAULT_SNOOZE);
            true
        }
    }
}
