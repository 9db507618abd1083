//! Repeated stratified k-fold splitting.
//!
//! Every repeat assigns each observation to exactly one test fold so that
//! each fold's class counts differ by at most one from an even share. Class
//! fold assignments are shuffled with a single seeded RNG stream shared across
//! repeats, so the full split set is a pure function of `(labels, seed)`.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::Label;

/// One (train, test) partition of the observation indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Which repeat this fold belongs to.
    pub repeat: usize,
    /// Index of the fold within its repeat.
    pub split: usize,
    /// Training indices, ascending.
    pub train: Vec<usize>,
    /// Held-out indices, ascending.
    pub test: Vec<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("n_splits must be at least 2, got {0}")]
    TooFewSplits(usize),

    #[error("n_repeats must be at least 1")]
    NoRepeats,

    #[error("cannot split {n_samples} observations into {n_splits} folds")]
    TooFewSamples { n_samples: usize, n_splits: usize },

    #[error("n_splits={n_splits} exceeds the number of members in every class (largest class has {largest})")]
    ClassesTooSmall { n_splits: usize, largest: usize },
}

/// Splitter configuration: `n_repeats` rounds of stratified `n_splits`-fold CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedStratifiedKFold {
    pub n_splits: usize,
    pub n_repeats: usize,
    pub seed: u64,
}

impl Default for RepeatedStratifiedKFold {
    fn default() -> Self {
        RepeatedStratifiedKFold {
            n_splits: 5,
            n_repeats: 1,
            seed: 1,
        }
    }
}

impl RepeatedStratifiedKFold {
    pub fn new(n_splits: usize, n_repeats: usize, seed: u64) -> Self {
        RepeatedStratifiedKFold {
            n_splits,
            n_repeats,
            seed,
        }
    }

    /// Total number of folds produced by [`split`](Self::split).
    pub fn n_folds(&self) -> usize {
        self.n_splits * self.n_repeats
    }

    /// Generate all `n_repeats × n_splits` folds for the given labels.
    pub fn split(&self, labels: &[Label]) -> Result<Vec<Fold>, SplitError> {
        if self.n_splits < 2 {
            return Err(SplitError::TooFewSplits(self.n_splits));
        }
        if self.n_repeats == 0 {
            return Err(SplitError::NoRepeats);
        }
        let n_samples = labels.len();
        if n_samples < self.n_splits {
            return Err(SplitError::TooFewSamples {
                n_samples,
                n_splits: self.n_splits,
            });
        }

        let encoded = encode_by_first_appearance(labels);
        let n_classes = encoded.iter().copied().max().map_or(0, |m| m + 1);
        let mut class_counts = vec![0usize; n_classes];
        for &c in &encoded {
            class_counts[c] += 1;
        }

        let largest = class_counts.iter().copied().max().unwrap_or(0);
        if largest < self.n_splits {
            return Err(SplitError::ClassesTooSmall {
                n_splits: self.n_splits,
                largest,
            });
        }
        let smallest = class_counts.iter().copied().min().unwrap_or(0);
        if smallest < self.n_splits {
            log::warn!(
                "The least populated class has only {} members, which is less than n_splits={}",
                smallest,
                self.n_splits
            );
        }

        let allocation = fold_allocation(&encoded, n_classes, self.n_splits);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut folds = Vec::with_capacity(self.n_folds());
        for repeat in 0..self.n_repeats {
            let test_fold_of = assign_test_folds(&encoded, &allocation, self.n_splits, &mut rng);
            for split in 0..self.n_splits {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| test_fold_of[i] == split);
                folds.push(Fold {
                    repeat,
                    split,
                    train,
                    test,
                });
            }
        }
        Ok(folds)
    }
}

/// Map labels to dense class ids ordered by first appearance.
fn encode_by_first_appearance(labels: &[Label]) -> Vec<usize> {
    let mut ids: HashMap<Label, usize> = HashMap::new();
    labels
        .iter()
        .map(|l| {
            let next = ids.len();
            *ids.entry(*l).or_insert(next)
        })
        .collect()
}

/// `allocation[fold][class]`: how many members of each class land in each test
/// fold. Sorting the class ids and dealing them round-robin keeps per-fold
/// class counts within one of each other.
fn fold_allocation(encoded: &[usize], n_classes: usize, n_splits: usize) -> Vec<Vec<usize>> {
    let mut ordered = encoded.to_vec();
    ordered.sort_unstable();
    let mut allocation = vec![vec![0usize; n_classes]; n_splits];
    for (pos, &class) in ordered.iter().enumerate() {
        allocation[pos % n_splits][class] += 1;
    }
    allocation
}

fn assign_test_folds(
    encoded: &[usize],
    allocation: &[Vec<usize>],
    n_splits: usize,
    rng: &mut StdRng,
) -> Vec<usize> {
    let n_classes = allocation.first().map_or(0, |row| row.len());
    let mut test_fold_of = vec![0usize; encoded.len()];
    for class in 0..n_classes {
        let mut folds_for_class: Vec<usize> = (0..n_splits)
            .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
            .collect();
        folds_for_class.shuffle(rng);

        let members = encoded
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == class)
            .map(|(i, _)| i);
        for (idx, fold) in members.zip(folds_for_class) {
            test_fold_of[idx] = fold;
        }
    }
    test_fold_of
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_labels(n: usize) -> Vec<Label> {
        (0..n).map(|i| (i % 2) as Label).collect()
    }

    #[test]
    fn test_folds_are_disjoint_and_cover_everything() {
        let labels = balanced_labels(100);
        let folds = RepeatedStratifiedKFold::new(5, 3, 1).split(&labels).unwrap();
        assert_eq!(folds.len(), 15);

        for fold in &folds {
            let mut seen = vec![false; labels.len()];
            for &i in fold.train.iter().chain(&fold.test) {
                assert!(!seen[i], "index {} appears twice in fold {:?}", i, (fold.repeat, fold.split));
                seen[i] = true;
            }
            assert!(seen.iter().all(|&s| s), "fold does not cover every index");
        }
    }

    #[test]
    fn test_each_repeat_tests_every_index_once() {
        let labels = balanced_labels(37);
        let folds = RepeatedStratifiedKFold::new(5, 2, 7).split(&labels).unwrap();
        for repeat in 0..2 {
            let mut count = vec![0usize; labels.len()];
            for fold in folds.iter().filter(|f| f.repeat == repeat) {
                for &i in &fold.test {
                    count[i] += 1;
                }
            }
            assert!(count.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_stratification_preserves_proportions() {
        // 30% class 1
        let labels: Vec<Label> = (0..100).map(|i| if i % 10 < 3 { 1 } else { 0 }).collect();
        let folds = RepeatedStratifiedKFold::new(5, 1, 1).split(&labels).unwrap();
        for fold in &folds {
            let ones = fold.test.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(fold.test.len(), 20);
            assert_eq!(ones, 6, "fold {} has {} positives", fold.split, ones);
        }
    }

    #[test]
    fn test_uneven_class_counts_differ_by_at_most_one() {
        let labels: Vec<Label> = (0..23).map(|i| if i < 13 { 2 } else { 7 }).collect();
        let folds = RepeatedStratifiedKFold::new(5, 1, 3).split(&labels).unwrap();
        for class in [2, 7] {
            let counts: Vec<usize> = folds
                .iter()
                .map(|f| f.test.iter().filter(|&&i| labels[i] == class).count())
                .collect();
            let max = *counts.iter().max().unwrap();
            let min = *counts.iter().min().unwrap();
            assert!(max - min <= 1, "class {} counts {:?}", class, counts);
        }
    }

    #[test]
    fn test_same_seed_same_splits() {
        let labels = balanced_labels(50);
        let a = RepeatedStratifiedKFold::new(5, 2, 1).split(&labels).unwrap();
        let b = RepeatedStratifiedKFold::new(5, 2, 1).split(&labels).unwrap();
        assert_eq!(a, b);

        let c = RepeatedStratifiedKFold::new(5, 2, 2).split(&labels).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_repeats_differ() {
        let labels = balanced_labels(60);
        let folds = RepeatedStratifiedKFold::new(5, 2, 1).split(&labels).unwrap();
        let first: Vec<_> = folds[..5].iter().map(|f| f.test.clone()).collect();
        let second: Vec<_> = folds[5..].iter().map(|f| f.test.clone()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_configurations() {
        let labels = balanced_labels(10);
        assert!(matches!(
            RepeatedStratifiedKFold::new(1, 1, 1).split(&labels),
            Err(SplitError::TooFewSplits(1))
        ));
        assert!(matches!(
            RepeatedStratifiedKFold::new(5, 0, 1).split(&labels),
            Err(SplitError::NoRepeats)
        ));
        assert!(matches!(
            RepeatedStratifiedKFold::new(5, 1, 1).split(&labels[..3]),
            Err(SplitError::TooFewSamples { .. })
        ));
        // Two classes of 4 each cannot fill 5 folds.
        let small: Vec<Label> = balanced_labels(8);
        assert!(matches!(
            RepeatedStratifiedKFold::new(5, 1, 1).split(&small),
            Err(SplitError::ClassesTooSmall { largest: 4, .. })
        ));
    }
}
