//! Helpers for taking calibration points

use alloc::vec::Vec;

/// Reduce a series of meter readings to a single calibration value.
///
/// Non-positive readings (silent probe) are dropped. With four or more left,
/// the lowest and highest are discarded before averaging. Returns `None` when
/// nothing usable remains.
pub fn stable_frequency(readings: &[f32]) -> Option<f32> {
    let mut valid: Vec<f32> = readings
        .iter()
        .copied()
        .filter(|reading| *reading > 0.0)
        .collect();

    if valid.is_empty() {
        return None;
    }

    if valid.len() >= 4 {
        valid.sort_by(|a, b| a.total_cmp(b));
        valid.pop();
        valid.remove(0);
    }

    Some(valid.iter().sum::<f32>() / valid.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_outliers() {
        let readings = [10.0, 11.0, 50.0, 12.0, 1.0];
        assert_eq!(stable_frequency(&readings), Some(11.0));
    }

    #[test]
    fn test_few_readings_are_not_trimmed() {
        assert_eq!(stable_frequency(&[2.0, 4.0, 9.0]), Some(5.0));
    }

    #[test]
    fn test_silent_readings_dropped() {
        assert_eq!(stable_frequency(&[0.0, 0.0, 6.0, 0.0]), Some(6.0));
        assert_eq!(stable_frequency(&[0.0, -1.0]), None);
        assert_eq!(stable_frequency(&[]), None);
    }
}
