//! Ridge classifier with leave-one-out selection of the penalty.
//!
//! Labels are one-vs-all encoded to ±1 targets (a single target column for
//! two classes) and fitted with an unpenalised intercept. For each candidate
//! alpha the exact leave-one-out residuals come from the hat matrix
//!
//! ```text
//! H = 11ᵀ/n + Xc (XcᵀXc + αI)⁻¹ Xcᵀ,   e_i = (y_i - ŷ_i) / (1 - H_ii)
//! ```
//!
//! and the alpha with the smallest mean squared LOO residual wins (the first
//! one on ties).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::classifier::{Classifier, ClassifierError};
use crate::Label;

/// Default penalty grid.
pub const DEFAULT_ALPHAS: [f64; 3] = [0.1, 1.0, 10.0];

#[derive(Debug, Clone)]
pub struct RidgeClassifierCv {
    alphas: Vec<f64>,
    n_jobs: usize,
    fitted: Option<RidgeFit>,
}

#[derive(Debug, Clone)]
struct RidgeFit {
    classes: Vec<Label>,
    /// n_features × n_targets
    coef: Array2<f64>,
    intercept: Array1<f64>,
    alpha: f64,
}

impl Default for RidgeClassifierCv {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHAS.to_vec(), 1)
    }
}

impl RidgeClassifierCv {
    /// `n_jobs > 1` scores the alpha grid on the rayon pool.
    pub fn new(alphas: Vec<f64>, n_jobs: usize) -> Self {
        RidgeClassifierCv {
            alphas,
            n_jobs,
            fitted: None,
        }
    }

    /// Penalty picked by the last fit.
    pub fn alpha(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.alpha)
    }

    /// Sorted class labels seen during the last fit.
    pub fn classes(&self) -> Option<&[Label]> {
        self.fitted.as_ref().map(|f| f.classes.as_slice())
    }

    /// Raw decision values, one column per target.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let fit = self.fitted.as_ref().ok_or(ClassifierError::NotFitted)?;
        if x.ncols() != fit.coef.nrows() {
            return Err(ClassifierError::FeatureMismatch {
                expected: fit.coef.nrows(),
                got: x.ncols(),
            });
        }
        Ok(x.dot(&fit.coef) + &fit.intercept)
    }
}

impl Classifier for RidgeClassifierCv {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<(), ClassifierError> {
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(ClassifierError::EmptyInput);
        }
        if n != y.len() {
            return Err(ClassifierError::LabelMismatch {
                rows: n,
                labels: y.len(),
            });
        }
        if self.alphas.is_empty() || self.alphas.iter().any(|&a| !(a > 0.0)) {
            return Err(ClassifierError::InvalidAlphas(self.alphas.clone()));
        }

        let classes = sorted_classes(y);
        if classes.len() < 2 {
            return Err(ClassifierError::SingleClass(classes.first().copied()));
        }
        let targets = encode_targets(y, &classes);

        let x_mean = x.mean_axis(Axis(0)).ok_or(ClassifierError::EmptyInput)?;
        let t_mean = targets.mean_axis(Axis(0)).ok_or(ClassifierError::EmptyInput)?;
        let xc = &x - &x_mean;
        let tc = &targets - &t_mean;
        let gram = xc.t().dot(&xc);
        let xt_t = xc.t().dot(&tc);

        let score = |alpha: f64| loo_mean_squared_error(&xc, &tc, &gram, &xt_t, alpha);
        let errors: Vec<f64> = if self.n_jobs > 1 {
            self.alphas.par_iter().map(|&a| score(a)).collect::<Result<_, _>>()?
        } else {
            self.alphas.iter().map(|&a| score(a)).collect::<Result<_, _>>()?
        };

        let mut best = 0;
        for (i, &err) in errors.iter().enumerate() {
            if err < errors[best] {
                best = i;
            }
        }
        let alpha = self.alphas[best];
        log::trace!("ridge LOO errors {:?} -> alpha {}", errors, alpha);

        let chol = cholesky(&penalized(&gram, alpha))?;
        let coef = solve_columns(&chol, &xt_t);
        let intercept = &t_mean - &x_mean.dot(&coef);

        self.fitted = Some(RidgeFit {
            classes,
            coef,
            intercept,
            alpha,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>, ClassifierError> {
        let decision = self.decision_function(x)?;
        let fit = self.fitted.as_ref().ok_or(ClassifierError::NotFitted)?;
        let predictions = decision
            .rows()
            .into_iter()
            .map(|row| {
                if fit.classes.len() == 2 {
                    if row[0] > 0.0 {
                        fit.classes[1]
                    } else {
                        fit.classes[0]
                    }
                } else {
                    fit.classes[argmax(row)]
                }
            })
            .collect();
        Ok(predictions)
    }

    fn name(&self) -> &str {
        "RidgeClassifierCV"
    }
}

fn sorted_classes(y: &[Label]) -> Vec<Label> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// ±1 one-vs-all targets; two classes collapse to one column (+1 = second class).
fn encode_targets(y: &[Label], classes: &[Label]) -> Array2<f64> {
    if classes.len() == 2 {
        Array2::from_shape_fn((y.len(), 1), |(i, _)| if y[i] == classes[1] { 1.0 } else { -1.0 })
    } else {
        Array2::from_shape_fn((y.len(), classes.len()), |(i, k)| {
            if y[i] == classes[k] {
                1.0
            } else {
                -1.0
            }
        })
    }
}

fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

fn penalized(gram: &Array2<f64>, alpha: f64) -> Array2<f64> {
    let mut a = gram.clone();
    for i in 0..a.nrows() {
        a[[i, i]] += alpha;
    }
    a
}

fn loo_mean_squared_error(
    xc: &Array2<f64>,
    tc: &Array2<f64>,
    gram: &Array2<f64>,
    xt_t: &Array2<f64>,
    alpha: f64,
) -> Result<f64, ClassifierError> {
    let n = xc.nrows();
    let chol = cholesky(&penalized(gram, alpha))?;
    let coef = solve_columns(&chol, xt_t);
    let fitted = xc.dot(&coef);

    let mut total = 0.0;
    for i in 0..n {
        // x_iᵀ A⁻¹ x_i = |L⁻¹ x_i|²
        let z = forward_substitute(&chol, xc.row(i));
        let leverage = 1.0 / n as f64 + z.dot(&z);
        let denom = (1.0 - leverage).max(f64::EPSILON);
        for j in 0..tc.ncols() {
            let r = (tc[[i, j]] - fitted[[i, j]]) / denom;
            total += r * r;
        }
    }
    Ok(total / (n * tc.ncols()) as f64)
}

/// Lower-triangular L with A = L Lᵀ.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>, ClassifierError> {
    let p = a.nrows();
    let mut l = Array2::<f64>::zeros((p, p));
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) {
                    return Err(ClassifierError::NotPositiveDefinite);
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve L z = b.
fn forward_substitute(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let p = l.nrows();
    let mut z = Array1::<f64>::zeros(p);
    for i in 0..p {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    z
}

/// Solve Lᵀ x = z.
fn backward_substitute(l: &Array2<f64>, z: &Array1<f64>) -> Array1<f64> {
    let p = l.nrows();
    let mut x = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let mut sum = z[i];
        for k in (i + 1)..p {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve (L Lᵀ) X = B column by column.
fn solve_columns(l: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(b.raw_dim());
    for (j, col) in b.columns().into_iter().enumerate() {
        let z = forward_substitute(l, col);
        out.column_mut(j).assign(&backward_substitute(l, &z));
    }
    out
}
