//! Per-channel baseline statistics

use serde::{Deserialize, Serialize};

/// Summary of one channel's calibration samples
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationStatistic {
    /// Mean value
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Number of samples the statistic was computed from
    pub sample_count: usize,
}

impl CalibrationStatistic {
    /// Compute statistics from a slice of values
    ///
    /// An empty slice yields an all-zero statistic. Identical samples give
    /// exactly that value as mean and a zero standard deviation.
    pub fn from_samples(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        if min == max {
            return Self {
                mean: values[0],
                std_dev: 0.0,
                min,
                max,
                sample_count: values.len(),
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            sample_count: values.len(),
        }
    }

    /// Standard score of `value` against this baseline
    ///
    /// A degenerate baseline (std at rounding-noise level) never signals
    /// an anomaly.
    pub fn z_score(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        (value - self.mean) / self.std_dev
    }

    /// Standard deviation too small to divide by
    pub fn is_degenerate(&self) -> bool {
        self.std_dev <= f64::EPSILON * self.mean.abs().max(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_zero() {
        let stat = CalibrationStatistic::from_samples(&[]);
        assert_eq!(stat, CalibrationStatistic::default());
        assert!(stat.is_empty());
    }

    #[test]
    fn test_population_std() {
        // Classic example: population std of this set is exactly 2
        let stat = CalibrationStatistic::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stat.mean - 5.0).abs() < 1e-12);
        assert!((stat.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stat.min, 2.0);
        assert_eq!(stat.max, 9.0);
        assert_eq!(stat.sample_count, 8);
    }

    #[test]
    fn test_uniform_samples_have_zero_std() {
        let stat = CalibrationStatistic::from_samples(&[0.3; 30]);
        assert_eq!(stat.std_dev, 0.0);
        assert!((stat.mean - 0.3).abs() < 1e-12);
        assert_eq!(stat.z_score(0.1), 0.0);
    }

    #[test]
    fn test_uniform_samples_are_exact_for_inexact_sums() {
        // Neither of these sums exactly in binary floating point
        for (value, count) in [(0.2, 30), (0.15, 31)] {
            let stat = CalibrationStatistic::from_samples(&vec![value; count]);
            assert_eq!(stat.std_dev, 0.0);
            assert_eq!(stat.mean, value);
            assert_eq!(stat.z_score(value), 0.0);
            assert_eq!(stat.z_score(value - 0.001), 0.0);
        }
    }

    #[test]
    fn test_rounding_noise_std_is_degenerate() {
        let stat = CalibrationStatistic {
            mean: 0.15,
            std_dev: 2.7755575615628914e-17,
            min: 0.15,
            max: 0.15,
            sample_count: 31,
        };
        assert!(stat.is_degenerate());
        assert_eq!(stat.z_score(0.149), 0.0);
    }

    #[test]
    fn test_z_score() {
        let stat = CalibrationStatistic {
            mean: 0.30,
            std_dev: 0.02,
            min: 0.25,
            max: 0.35,
            sample_count: 300,
        };
        assert!((stat.z_score(0.20) + 5.0).abs() < 1e-9);
        assert!((stat.z_score(0.34) - 2.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_zero_std_gives_zero_z(mean in -1e6f64..1e6, value in -1e6f64..1e6) {
            let stat = CalibrationStatistic { mean, std_dev: 0.0, ..Default::default() };
            prop_assert_eq!(stat.z_score(value), 0.0);
        }

        #[test]
        fn prop_mean_within_bounds(values in proptest::collection::vec(-1e3f64..1e3, 1..200)) {
            let stat = CalibrationStatistic::from_samples(&values);
            prop_assert!(stat.mean >= stat.min - 1e-9 && stat.mean <= stat.max + 1e-9);
            prop_assert!(stat.std_dev >= 0.0);
        }

        #[test]
        fn prop_uniform_samples_have_zero_std(value in -1e3f64..1e3, count in 30usize..300) {
            let stat = CalibrationStatistic::from_samples(&vec![value; count]);
            prop_assert_eq!(stat.std_dev, 0.0);
            prop_assert_eq!(stat.mean, value);
        }
    }
}
