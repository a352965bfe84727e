//! Conversions between settings-file seconds and `embassy_time` durations

use embassy_time::Duration;

/// Convert a non-negative number of seconds into a [`Duration`].
///
/// Negative and NaN inputs collapse to zero.
pub fn secs_f32(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::from_ticks(0);
    }
    Duration::from_micros((secs * 1_000_000.0) as u64)
}

/// Seconds represented by `duration`, as used by the settings model.
pub fn as_secs_f32(duration: Duration) -> f32 {
    duration.as_micros() as f32 / 1_000_000.0
}
