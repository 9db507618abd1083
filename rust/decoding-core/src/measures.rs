//! Per-observation dispersion measures.
//!
//! Each observation is one row of the input matrix; the measures reduce the
//! row's samples (axis 1) to a single value:
//! - **MAD**: median of |x - median(x)|
//! - **MaxAD**: |max(x) - min(x)|
//! - **MeanAD**: mean of |x - mean(x)|
//! - **MADs**: all three stacked as columns, in that order

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Which dispersion feature to derive from the raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Measure {
    /// Median absolute deviation around the median.
    #[default]
    #[serde(rename = "MAD")]
    Mad,
    /// Range of the samples.
    #[serde(rename = "MaxAD")]
    MaxAd,
    /// Mean absolute deviation around the mean.
    #[serde(rename = "MeanAD")]
    MeanAd,
    /// MAD, MaxAD and MeanAD as three columns.
    #[serde(rename = "MADs")]
    Mads,
}

impl Measure {
    pub const ALL: [Measure; 4] = [Measure::Mad, Measure::MaxAd, Measure::MeanAd, Measure::Mads];

    /// Name used on the command line and in result file names.
    pub fn name(self) -> &'static str {
        match self {
            Measure::Mad => "MAD",
            Measure::MaxAd => "MaxAD",
            Measure::MeanAd => "MeanAD",
            Measure::Mads => "MADs",
        }
    }

    /// Number of feature columns this measure produces.
    pub fn n_columns(self) -> usize {
        match self {
            Measure::Mads => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measure {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measure::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| MeasureError::UnknownMeasure(s.to_string()))
    }
}

/// Errors raised while deriving features.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    #[error("unknown measure '{0}' (expected one of MAD, MaxAD, MeanAD, MADs)")]
    UnknownMeasure(String),

    #[error("cannot compute a dispersion measure over zero samples per observation")]
    NoSamples,
}

/// Reduce every row of `x` to the requested measure.
///
/// The output has the same number of rows as `x` and `measure.n_columns()`
/// columns.
pub fn derive_features(x: &Array2<f64>, measure: Measure) -> Result<Array2<f64>, MeasureError> {
    if x.ncols() == 0 {
        return Err(MeasureError::NoSamples);
    }

    let features = match measure {
        Measure::Mad => per_row(x, median_absolute_deviation).insert_axis(Axis(1)),
        Measure::MaxAd => per_row(x, max_abs_range).insert_axis(Axis(1)),
        Measure::MeanAd => per_row(x, mean_absolute_deviation).insert_axis(Axis(1)),
        Measure::Mads => {
            let mad = per_row(x, median_absolute_deviation);
            let max_ad = per_row(x, max_abs_range);
            let mean_ad = per_row(x, mean_absolute_deviation);
            Array2::from_shape_fn((x.nrows(), 3), |(i, c)| match c {
                0 => mad[i],
                1 => max_ad[i],
                _ => mean_ad[i],
            })
        }
    };
    Ok(features)
}

fn per_row(x: &Array2<f64>, f: fn(ArrayView1<f64>) -> f64) -> Array1<f64> {
    x.rows().into_iter().map(f).collect()
}

/// Median of a slice of values; the two middle values are averaged for even
/// lengths. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// median(|x - median(x)|), unscaled.
pub fn median_absolute_deviation(row: ArrayView1<f64>) -> f64 {
    let values: Vec<f64> = row.iter().copied().collect();
    let center = median(&values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// |max(x) - min(x)|.
pub fn max_abs_range(row: ArrayView1<f64>) -> f64 {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = row.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min).abs()
}

/// mean(|x - mean(x)|).
pub fn mean_absolute_deviation(row: ArrayView1<f64>) -> f64 {
    let n = row.len() as f64;
    let mean = row.sum() / n;
    row.iter().map(|v| (v - mean).abs()).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![
            [1.0, 2.0, 3.0, 4.0, 100.0],
            [5.0, 5.0, 5.0, 5.0, 5.0],
            [-3.0, 0.0, 3.0, 6.0, 9.0],
            [2.0, -2.0, 2.0, -2.0, 0.0],
        ]
    }

    #[test]
    fn test_column_counts_and_rows_preserved() {
        let x = sample();
        for measure in Measure::ALL {
            let f = derive_features(&x, measure).unwrap();
            assert_eq!(f.nrows(), x.nrows(), "{measure} changed row count");
            assert_eq!(f.ncols(), measure.n_columns(), "{measure} column count");
        }
        assert_eq!(Measure::Mads.n_columns(), 3);
    }

    #[test]
    fn test_mad_is_robust_to_outlier() {
        let f = derive_features(&sample(), Measure::Mad).unwrap();
        // median 3, deviations [2, 1, 0, 1, 97] -> median 1
        assert_abs_diff_eq!(f[[0, 0]], 1.0);
        // deviations from 3: [6, 3, 0, 3, 6] -> 3
        assert_abs_diff_eq!(f[[2, 0]], 3.0);
    }

    #[test]
    fn test_mad_even_length_averages_middle() {
        let row = array![1.0, 2.0, 3.0, 10.0];
        // median 2.5, deviations [1.5, 0.5, 0.5, 7.5] -> (0.5 + 1.5) / 2
        assert_abs_diff_eq!(median_absolute_deviation(row.view()), 1.0);
    }

    #[test]
    fn test_max_ad_is_range_and_non_negative() {
        let x = sample();
        let f = derive_features(&x, Measure::MaxAd).unwrap();
        for (i, row) in x.rows().into_iter().enumerate() {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            assert_abs_diff_eq!(f[[i, 0]], max - min);
            assert!(f[[i, 0]] >= 0.0);
        }
    }

    #[test]
    fn test_mean_ad_definition() {
        let f = derive_features(&sample(), Measure::MeanAd).unwrap();
        // mean 3, |dev| = [6, 3, 0, 3, 6] -> 18 / 5
        assert_abs_diff_eq!(f[[2, 0]], 3.6);
        // mean 0, |dev| all 2 except the last
        assert_abs_diff_eq!(f[[3, 0]], 8.0 / 5.0);
    }

    #[test]
    fn test_constant_row_is_zero_everywhere() {
        let f = derive_features(&sample(), Measure::Mads).unwrap();
        for c in 0..3 {
            assert_eq!(f[[1, c]], 0.0);
        }
    }

    #[test]
    fn test_mads_column_order() {
        let x = sample();
        let mads = derive_features(&x, Measure::Mads).unwrap();
        let mad = derive_features(&x, Measure::Mad).unwrap();
        let max_ad = derive_features(&x, Measure::MaxAd).unwrap();
        let mean_ad = derive_features(&x, Measure::MeanAd).unwrap();
        assert_eq!(mads.column(0), mad.column(0));
        assert_eq!(mads.column(1), max_ad.column(0));
        assert_eq!(mads.column(2), mean_ad.column(0));
    }

    #[test]
    fn test_measure_is_per_row_not_global() {
        let x = array![[0.0, 10.0], [100.0, 101.0]];
        let f = derive_features(&x, Measure::MaxAd).unwrap();
        assert_eq!(f[[0, 0]], 10.0);
        assert_eq!(f[[1, 0]], 1.0);
    }

    #[test]
    fn test_zero_samples_rejected() {
        let x = Array2::<f64>::zeros((3, 0));
        assert!(matches!(derive_features(&x, Measure::Mad), Err(MeasureError::NoSamples)));
    }

    #[test]
    fn test_parse_names() {
        for m in Measure::ALL {
            assert_eq!(m.name().parse::<Measure>().unwrap(), m);
        }
        assert!("mad".parse::<Measure>().is_err());
    }
}
