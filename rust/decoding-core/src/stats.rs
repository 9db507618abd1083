//! Accuracy and permutation-test summaries.

use serde::{Deserialize, Serialize};

use crate::Label;

/// Fraction of predictions equal to the truth. Empty input scores 0.
pub fn accuracy(predicted: &[Label], truth: &[Label]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    hits as f64 / truth.len() as f64
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Percentile of a sorted slice by linear interpolation (`p` in [0, 1]).
pub fn percentile_of(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = idx - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// One-sided empirical p-value of `observed` against a null sample:
/// (1 + #{null >= observed}) / (1 + n).
pub fn empirical_p_value(observed: f64, null: &[f64]) -> f64 {
    let exceed = null.iter().filter(|&&v| v >= observed).count();
    (1 + exceed) as f64 / (1 + null.len()) as f64
}

/// Where an observed accuracy sits in its permutation null distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullSummary {
    pub observed: f64,
    pub n_perms: usize,
    pub null_mean: f64,
    pub null_std: f64,
    pub null_p95: f64,
    pub p_value: f64,
}

impl NullSummary {
    pub fn compute(observed: f64, null: &[f64]) -> Self {
        let mut sorted = null.to_vec();
        sorted.sort_by(f64::total_cmp);
        NullSummary {
            observed,
            n_perms: null.len(),
            null_mean: mean(null),
            null_std: std_dev(null),
            null_p95: percentile_of(&sorted, 0.95),
            p_value: empirical_p_value(observed, null),
        }
    }

    pub fn significant_at(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_accuracy_bounds() {
        assert_eq!(accuracy(&[1, 2, 3], &[1, 2, 3]), 1.0);
        assert_eq!(accuracy(&[0, 0, 0], &[1, 2, 3]), 0.0);
        assert_abs_diff_eq!(accuracy(&[1, 0, 1, 0], &[1, 1, 1, 1]), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_mean_and_std() {
        assert_abs_diff_eq!(mean(&[0.5, 0.75, 1.0]), 0.75);
        assert_abs_diff_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        assert!((percentile_of(&sorted, 0.5) - 50.5).abs() < 1e-12);
        assert_eq!(percentile_of(&sorted, 0.0), 1.0);
        assert_eq!(percentile_of(&sorted, 1.0), 100.0);
        assert_eq!(percentile_of(&[3.0], 0.9), 3.0);
    }

    #[test]
    fn test_p_value_counts_ties_and_adds_one() {
        let null = [0.4, 0.5, 0.5, 0.6];
        assert_abs_diff_eq!(empirical_p_value(0.5, &null), 4.0 / 5.0);
        assert_abs_diff_eq!(empirical_p_value(0.9, &null), 1.0 / 5.0);
        assert_abs_diff_eq!(empirical_p_value(0.9, &[]), 1.0);
    }

    #[test]
    fn test_null_summary() {
        let null: Vec<f64> = (0..100).map(|i| 0.4 + 0.002 * i as f64).collect();
        let summary = NullSummary::compute(0.9, &null);
        assert_eq!(summary.n_perms, 100);
        assert!(summary.null_mean > 0.49 && summary.null_mean < 0.5);
        assert!(summary.null_p95 < 0.9);
        assert!(summary.significant_at(0.05));
        assert!(!NullSummary::compute(0.45, &null).significant_at(0.05));
    }
}
