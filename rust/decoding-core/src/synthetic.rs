//! Synthetic trial matrices for tests and benchmarks.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::Label;

/// Balanced binary labels (half 0, half 1) in shuffled order, plus a matrix of
/// Gaussian samples whose spread grows by `effect` for class-1 rows.
///
/// With `effect == 0.0` the labels carry no information about the samples.
pub fn dispersion_trials(
    n_obs: usize,
    n_samples: usize,
    effect: f64,
    seed: u64,
) -> (Array2<f64>, Vec<Label>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels: Vec<Label> = (0..n_obs).map(|i| (i % 2) as Label).collect();
    labels.shuffle(&mut rng);

    let mut x = Array2::<f64>::zeros((n_obs, n_samples));
    for (i, mut row) in x.rows_mut().into_iter().enumerate() {
        let sigma = 1.0 + effect * labels[i] as f64;
        for v in row.iter_mut() {
            let z: f64 = rng.sample(StandardNormal);
            *v = sigma * z;
        }
    }
    (x, labels)
}
