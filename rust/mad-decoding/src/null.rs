//! Permutation null distributions of decoding accuracy.
//!
//! Permutation `i` reruns every fold with training labels shuffled by an RNG
//! seeded from `(seed, i)`, so each permutation is independent of scheduling
//! and the distribution is identical for any number of rayon workers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use decoding_core::ClassifierKind;

use crate::config::NullConfig;
use crate::evaluate::{CrossValidation, EvalError};

/// Seed for permutation `perm` under base seed `base`.
pub fn permutation_seed(base: u64, perm: usize) -> u64 {
    base ^ (perm as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Mean accuracy with training labels permuted by the RNG for `perm`.
pub fn permuted_accuracy(
    cv: &CrossValidation<'_>,
    kind: ClassifierKind,
    base_seed: u64,
    perm: usize,
) -> Result<f64, EvalError> {
    let mut rng = StdRng::seed_from_u64(permutation_seed(base_seed, perm));
    cv.mean_accuracy(kind, Some(&mut rng))
}

/// `config.n_perms` null accuracies in permutation order.
pub fn null_distribution(
    cv: &CrossValidation<'_>,
    kind: ClassifierKind,
    config: &NullConfig,
) -> Result<Vec<f64>, EvalError> {
    let n = config.n_perms;
    let step = (n / 10).max(1);
    let done = AtomicUsize::new(0);

    log::info!("{}: computing {} permutations", kind, n);
    let accs = (0..n)
        .into_par_iter()
        .map(|perm| {
            let acc = permuted_accuracy(cv, kind, config.seed, perm)?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % step == 0 || finished == n {
                log::info!("{}: {}/{} permutations ({}%)", kind, finished, n, finished * 100 / n);
            }
            Ok(acc)
        })
        .collect::<Result<Vec<f64>, EvalError>>()?;
    Ok(accs)
}

/// Null accuracies per classifier, keyed by name.
pub fn null_distributions(
    cv: &CrossValidation<'_>,
    kinds: &[ClassifierKind],
    config: &NullConfig,
) -> Result<BTreeMap<String, Vec<f64>>, EvalError> {
    let mut out = BTreeMap::new();
    for &kind in kinds {
        out.insert(kind.name().to_string(), null_distribution(cv, kind, config)?);
    }
    Ok(out)
}
