use serde::{Deserialize, Serialize};

/// Maps a probe frequency onto a saturation fraction.
///
/// Linear between the two calibration points, clamped to 0.0..=1.0. The
/// points are plain fields so recalibration applies on the next evaluation.
/// `wet_point` may be below `dry_point`; the Grow HAT probes slow down as the
/// soil gets wetter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationModel {
    /// Frequency (Hz) at 0% saturation
    pub dry_point: f32,
    /// Frequency (Hz) at 100% saturation
    pub wet_point: f32,
}

impl SaturationModel {
    pub const fn new(dry_point: f32, wet_point: f32) -> Self {
        Self {
            dry_point,
            wet_point,
        }
    }

    /// Saturation for `frequency`. A silent probe (0 Hz) always reads 0.0.
    pub fn saturation(&self, frequency: f32) -> f32 {
        if frequency == 0.0 || !frequency.is_finite() {
            return 0.0;
        }

        let span = self.wet_point - self.dry_point;
        if span == 0.0 || !span.is_finite() {
            return 0.0;
        }

        ((frequency - self.dry_point) / span).clamp(0.0, 1.0)
    }
}
