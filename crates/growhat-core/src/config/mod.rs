//! Persisted settings for the three channels and the alarm

mod schema;

pub use schema::*;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::actuators::DoseRequest;
use crate::board::CHANNEL_COUNT;
use crate::sensors::SaturationModel;
use crate::timing::secs_f32;

/// Settings for one sensor/pump channel
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    pub enabled: bool,
    /// Saturation below which the channel alarms
    pub warn_level: f32,
    /// Saturation below which the channel is watered
    pub water_level: f32,
    pub auto_water: bool,
    /// Pump drive, 0.0..=1.0
    pub pump_speed: f32,
    /// Dose length in seconds
    pub pump_time: f32,
    /// Minimum seconds between automatic doses
    pub watering_delay: u32,
    /// Probe frequency (Hz) at 100% saturation
    pub wet_point: f32,
    /// Probe frequency (Hz) at 0% saturation
    pub dry_point: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            warn_level: 0.5,
            water_level: 0.5,
            auto_water: false,
            pump_speed: 0.5,
            pump_time: 0.2,
            watering_delay: 60,
            // Edge-triggered scale. A polled meter counts both edges and
            // reads twice these, so recalibrate channels it measures.
            wet_point: 0.7,
            dry_point: 26.7,
        }
    }
}

impl ChannelSettings {
    pub fn model(&self) -> SaturationModel {
        SaturationModel::new(self.dry_point, self.wet_point)
    }

    /// The dose an automatic watering issues
    pub fn dose_request(&self) -> DoseRequest {
        DoseRequest::new(self.pump_speed, secs_f32(self.pump_time))
    }

    pub fn watering_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.watering_delay))
    }
}

/// Settings shared by the whole board
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeneralSettings {
    pub alarm_enable: bool,
    /// Seconds between alarm beep bursts
    pub alarm_interval: u32,
    /// Ambient light (lux) below which the room counts as dark
    pub light_level_low: f32,
    /// Blank the display while the room is dark
    pub black_screen_when_light_low: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            alarm_enable: true,
            alarm_interval: 10,
            light_level_low: 4.0,
            black_screen_when_light_low: true,
        }
    }
}

impl GeneralSettings {
    pub fn alarm_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.alarm_interval))
    }

    /// Whether `lux` counts as lights out. No reading means lights on.
    pub fn lights_out(&self, lux: Option<f32>) -> bool {
        lux.is_some_and(|lux| lux < self.light_level_low)
    }
}

/// The full settings record, one section per channel plus a general section
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub channels: [ChannelSettings; CHANNEL_COUNT],
    pub general: GeneralSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        for channel in settings.channels.iter() {
            assert!(!channel.enabled);
            assert!(!channel.auto_water);
            assert_eq!(channel.water_level, 0.5);
            assert_eq!(channel.warn_level, 0.5);
            assert_eq!(channel.watering_delay(), Duration::from_secs(60));
            assert_eq!(channel.model(), SaturationModel::new(26.7, 0.7));
        }
        assert!(settings.general.alarm_enable);
        assert_eq!(settings.general.alarm_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_dose_request_from_settings() {
        let channel = ChannelSettings::default();
        let request = channel.dose_request();
        assert_eq!(request.speed(), 0.5);
        assert_eq!(request.duration(), Duration::from_millis(200));
    }

    #[test]
    fn test_lights_out() {
        let general = GeneralSettings::default();
        assert!(general.lights_out(Some(3.9)));
        assert!(!general.lights_out(Some(4.0)));
        assert!(!general.lights_out(None));
    }
}
