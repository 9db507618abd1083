//! Cross-validated decoding accuracy.
//!
//! Every fold gets a freshly built classifier, fitted on the training rows and
//! scored on the test rows. A classifier's accuracy is the mean over all folds
//! of all repeats.

use std::collections::BTreeMap;

use ndarray::{ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use decoding_core::stats::mean;
use decoding_core::{
    accuracy, BuildOptions, ClassifierBuilder, ClassifierError, ClassifierKind, Fold, Label,
};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{kind} failed on repeat {repeat}, fold {split}: {source}")]
    Fold {
        kind: ClassifierKind,
        repeat: usize,
        split: usize,
        #[source]
        source: ClassifierError,
    },

    #[error("no cross-validation folds to evaluate")]
    NoFolds,
}

/// Features, labels and the folds to score them on.
pub struct CrossValidation<'a> {
    pub features: ArrayView2<'a, f64>,
    pub labels: &'a [Label],
    pub folds: &'a [Fold],
    pub builder: &'a dyn ClassifierBuilder,
    pub options: BuildOptions,
}

impl<'a> CrossValidation<'a> {
    /// Accuracy of every fold, in fold order. With `permute`, each fold's
    /// training labels are shuffled before fitting; test labels stay intact.
    pub fn fold_accuracies(
        &self,
        kind: ClassifierKind,
        mut permute: Option<&mut StdRng>,
    ) -> Result<Vec<f64>, EvalError> {
        if self.folds.is_empty() {
            return Err(EvalError::NoFolds);
        }
        let mut accs = Vec::with_capacity(self.folds.len());
        for fold in self.folds {
            let wrap = |source: ClassifierError| EvalError::Fold {
                kind,
                repeat: fold.repeat,
                split: fold.split,
                source,
            };

            let x_train = self.features.select(Axis(0), &fold.train);
            let x_test = self.features.select(Axis(0), &fold.test);
            let mut y_train: Vec<Label> = fold.train.iter().map(|&i| self.labels[i]).collect();
            let y_test: Vec<Label> = fold.test.iter().map(|&i| self.labels[i]).collect();
            if let Some(rng) = permute.as_deref_mut() {
                y_train.shuffle(rng);
            }

            let mut clf = self.builder.build(kind, &self.options).map_err(wrap)?.into_estimator();
            clf.fit(x_train.view(), &y_train).map_err(wrap)?;
            let predicted = clf.predict(x_test.view()).map_err(wrap)?;
            accs.push(accuracy(&predicted, &y_test));
        }
        Ok(accs)
    }

    /// Mean fold accuracy.
    pub fn mean_accuracy(
        &self,
        kind: ClassifierKind,
        permute: Option<&mut StdRng>,
    ) -> Result<f64, EvalError> {
        Ok(mean(&self.fold_accuracies(kind, permute)?))
    }

    /// Mean accuracy per classifier, keyed by name.
    pub fn evaluate(&self, kinds: &[ClassifierKind]) -> Result<BTreeMap<String, f64>, EvalError> {
        let mut full_accs = BTreeMap::new();
        for &kind in kinds {
            let acc = self.mean_accuracy(kind, None)?;
            log::info!("{}: mean accuracy {:.4} over {} folds", kind, acc, self.folds.len());
            full_accs.insert(kind.name().to_string(), acc);
        }
        Ok(full_accs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decoding_core::synthetic::dispersion_trials;
    use decoding_core::{
        derive_features, BuiltClassifier, Classifier, DefaultClassifierBuilder, Measure,
        RepeatedStratifiedKFold,
    };
    use rand::SeedableRng;

    /// Predicts the first training label for everything.
    struct FirstLabel(Label);

    impl Classifier for FirstLabel {
        fn fit(&mut self, _x: ArrayView2<f64>, y: &[Label]) -> Result<(), ClassifierError> {
            self.0 = *y.first().ok_or(ClassifierError::EmptyInput)?;
            Ok(())
        }
        fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>, ClassifierError> {
            Ok(vec![self.0; x.nrows()])
        }
    }

    struct FirstLabelBuilder;

    impl ClassifierBuilder for FirstLabelBuilder {
        fn build(
            &self,
            _kind: ClassifierKind,
            _options: &BuildOptions,
        ) -> Result<BuiltClassifier, ClassifierError> {
            Ok(BuiltClassifier::Ready(Box::new(FirstLabel(0))))
        }
    }

    #[test]
    fn test_mean_is_mean_of_folds() {
        let (x, y) = dispersion_trials(40, 20, 1.0, 2);
        let features = derive_features(&x, Measure::Mad).unwrap();
        let folds = RepeatedStratifiedKFold::new(5, 2, 1).split(&y).unwrap();
        let cv = CrossValidation {
            features: features.view(),
            labels: &y,
            folds: &folds,
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };
        let accs = cv.fold_accuracies(ClassifierKind::Lr, None).unwrap();
        assert_eq!(accs.len(), 10);
        assert!(accs.iter().all(|a| (0.0..=1.0).contains(a)));
        let m = cv.mean_accuracy(ClassifierKind::Lr, None).unwrap();
        assert!((m - accs.iter().sum::<f64>() / 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_predictor_scores_class_share() {
        let y: Vec<Label> = (0..20).map(|i| (i % 2) as Label).collect();
        let x = ndarray::Array2::<f64>::zeros((20, 1));
        let folds = RepeatedStratifiedKFold::new(5, 1, 1).split(&y).unwrap();
        let cv = CrossValidation {
            features: x.view(),
            labels: &y,
            folds: &folds,
            builder: &FirstLabelBuilder,
            options: BuildOptions::default(),
        };
        let acc = cv.mean_accuracy(ClassifierKind::Lr, None).unwrap();
        assert!((acc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_permutation_changes_training_labels_only() {
        let (x, y) = dispersion_trials(60, 30, 2.0, 4);
        let features = derive_features(&x, Measure::Mad).unwrap();
        let folds = RepeatedStratifiedKFold::default().split(&y).unwrap();
        let cv = CrossValidation {
            features: features.view(),
            labels: &y,
            folds: &folds,
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let pa = cv.fold_accuracies(ClassifierKind::Lr, Some(&mut a)).unwrap();
        let pb = cv.fold_accuracies(ClassifierKind::Lr, Some(&mut b)).unwrap();
        assert_eq!(pa, pb);
        assert!(pa.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_single_class_fold_is_an_error() {
        let y: Vec<Label> = vec![0; 10];
        let x = ndarray::Array2::<f64>::zeros((10, 1));
        let folds = RepeatedStratifiedKFold::new(2, 1, 1).split(&y).unwrap();
        let cv = CrossValidation {
            features: x.view(),
            labels: &y,
            folds: &folds,
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };
        assert!(matches!(
            cv.evaluate(&[ClassifierKind::Lr]),
            Err(EvalError::Fold {
                source: ClassifierError::SingleClass(_),
                ..
            })
        ));
    }

    #[test]
    fn test_no_folds() {
        let x = ndarray::Array2::<f64>::zeros((0, 1));
        let cv = CrossValidation {
            features: x.view(),
            labels: &[],
            folds: &[],
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };
        assert!(matches!(cv.evaluate(&[ClassifierKind::Lr]), Err(EvalError::NoFolds)));
    }
}
