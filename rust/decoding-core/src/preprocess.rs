//! Feature preprocessing stages fitted on training rows only.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::classifier::ClassifierError;
use crate::Label;

/// Column-wise standardisation to zero mean and unit variance (ddof = 0).
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), ClassifierError> {
        let mean = x.mean_axis(Axis(0)).ok_or(ClassifierError::EmptyInput)?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| {
            // Near-constant columns are centred but not rescaled.
            if s < 10.0 * f64::EPSILON {
                1.0
            } else {
                s
            }
        });
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(ClassifierError::NotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(ClassifierError::FeatureMismatch {
                expected: mean.len(),
                got: x.ncols(),
            });
        }
        Ok((&x - mean) / scale)
    }
}

/// Keeps the top `percentile` percent of columns ranked by ANOVA F-score.
#[derive(Debug, Clone)]
pub struct SelectPercentile {
    percentile: f64,
    selected: Option<Vec<usize>>,
}

impl SelectPercentile {
    pub fn new(percentile: f64) -> Self {
        SelectPercentile {
            percentile,
            selected: None,
        }
    }

    /// Column indices kept by the last fit, in original order.
    pub fn selected(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<(), ClassifierError> {
        let n_features = x.ncols();
        if n_features == 0 {
            return Err(ClassifierError::EmptyInput);
        }
        if self.percentile >= 100.0 {
            self.selected = Some((0..n_features).collect());
            return Ok(());
        }

        let keep = ((n_features as f64 * self.percentile / 100.0).floor() as usize).max(1);
        let scores = anova_f_scores(x, y);
        let mut order: Vec<usize> = (0..n_features).collect();
        // NaN scores (constant columns) sort last; equal scores keep column order.
        order.sort_by(|&a, &b| {
            let sa = if scores[a].is_nan() { f64::NEG_INFINITY } else { scores[a] };
            let sb = if scores[b].is_nan() { f64::NEG_INFINITY } else { scores[b] };
            sb.total_cmp(&sa)
        });
        let mut selected: Vec<usize> = order.into_iter().take(keep).collect();
        selected.sort_unstable();
        log::debug!("SelectPercentile({}) kept columns {:?}", self.percentile, selected);
        self.selected = Some(selected);
        Ok(())
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let selected = self.selected.as_ref().ok_or(ClassifierError::NotFitted)?;
        if let Some(&max) = selected.iter().max() {
            if max >= x.ncols() {
                return Err(ClassifierError::FeatureMismatch {
                    expected: max + 1,
                    got: x.ncols(),
                });
            }
        }
        Ok(x.select(Axis(1), selected))
    }
}

/// One-way ANOVA F statistic of each column against the class labels.
///
/// Columns with no within-class variance score `inf` when the class means
/// differ and `NaN` when the column is constant.
pub fn anova_f_scores(x: ArrayView2<f64>, y: &[Label]) -> Vec<f64> {
    let mut classes: Vec<Label> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let n = y.len() as f64;
    let k = classes.len() as f64;

    x.columns()
        .into_iter()
        .map(|col| {
            let grand_mean = col.sum() / n;
            let mut ss_between = 0.0;
            let mut ss_within = 0.0;
            for &class in &classes {
                let members: Vec<f64> = col
                    .iter()
                    .zip(y)
                    .filter(|&(_, l)| *l == class)
                    .map(|(&v, _)| v)
                    .collect();
                let m = members.len() as f64;
                let class_mean = members.iter().sum::<f64>() / m;
                ss_between += m * (class_mean - grand_mean).powi(2);
                ss_within += members.iter().map(|v| (v - class_mean).powi(2)).sum::<f64>();
            }
            let df_between = k - 1.0;
            let df_within = n - k;
            (ss_between / df_between) / (ss_within / df_within)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_scaler_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view()).unwrap();
        let t = scaler.transform(x.view()).unwrap();
        for col in t.columns() {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scaler_constant_column_only_centred() {
        let x = array![[5.0], [5.0], [5.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view()).unwrap();
        let t = scaler.transform(x.view()).unwrap();
        assert!(t.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scaler_requires_fit() {
        let x = array![[1.0]];
        assert!(matches!(
            StandardScaler::new().transform(x.view()),
            Err(ClassifierError::NotFitted)
        ));
    }

    #[test]
    fn test_f_scores_rank_informative_column_first() {
        let x = array![
            [0.0, 0.3],
            [0.1, -0.2],
            [0.2, 0.1],
            [1.0, 0.0],
            [1.1, 0.2],
            [1.2, -0.1],
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let scores = anova_f_scores(x.view(), &y);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > 100.0);
    }

    #[test]
    fn test_select_percentile_full_keeps_everything() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut sel = SelectPercentile::new(100.0);
        sel.fit(x.view(), &[0, 1]).unwrap();
        assert_eq!(sel.selected().unwrap(), &[0, 1, 2]);
        assert_eq!(sel.transform(x.view()).unwrap(), x);
    }

    #[test]
    fn test_select_percentile_keeps_best_half() {
        let x = array![
            [0.3, 0.0, 5.0, 1.0],
            [-0.2, 0.1, 5.0, 0.0],
            [0.1, 1.0, 5.0, 1.0],
            [0.0, 1.1, 5.0, 0.0],
        ];
        let y = [0, 0, 1, 1];
        let mut sel = SelectPercentile::new(50.0);
        sel.fit(x.view(), &y).unwrap();
        let kept = sel.selected().unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&1));
        // The constant column never wins.
        assert!(!kept.contains(&2));
    }
}
