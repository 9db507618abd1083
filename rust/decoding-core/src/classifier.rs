//! Classifier contract and the builder that produces a fresh instance per fold.
//!
//! Builders are keyed by [`ClassifierKind`] and return a [`BuiltClassifier`]:
//! either an estimator ready to fit, or the outcome of an internal
//! hyperparameter search whose best estimator must be used instead.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::preprocess::{SelectPercentile, StandardScaler};
use crate::ridge::{RidgeClassifierCv, DEFAULT_ALPHAS};
use crate::Label;

/// Errors raised while building, fitting or applying a classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier has not been fitted")]
    NotFitted,

    #[error("empty input matrix")]
    EmptyInput,

    #[error("{rows} rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("expected {expected} feature columns, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("training labels contain a single class ({0:?}); need at least two")]
    SingleClass(Option<Label>),

    #[error("ridge penalties must be positive, got {0:?}")]
    InvalidAlphas(Vec<f64>),

    #[error("feature-selection percentile must be in (0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("normal equations are not positive definite")]
    NotPositiveDefinite,

    #[error("unknown classifier '{0}'")]
    UnknownClassifier(String),
}

/// A supervised classifier over dense `f64` features and integer labels.
pub trait Classifier: Send {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<(), ClassifierError>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>, ClassifierError>;

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Classifiers the decoding analysis knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassifierKind {
    /// Ridge-regularised linear classifier with cross-validated penalty.
    #[serde(rename = "lr")]
    Lr,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 1] = [ClassifierKind::Lr];

    /// Key used in result mappings.
    pub fn name(self) -> &'static str {
        match self {
            ClassifierKind::Lr => "lr",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClassifierKind {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassifierKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ClassifierError::UnknownClassifier(s.to_string()))
    }
}

/// Options handed to a builder for every instance it constructs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    /// Percentage of features kept by univariate selection.
    pub select_percentile: f64,
    /// Worker count for the classifier's internal search.
    pub n_jobs: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            select_percentile: 100.0,
            n_jobs: 1,
        }
    }
}

/// Result of an internal hyperparameter search.
pub struct SearchOutcome {
    pub best_estimator: Box<dyn Classifier>,
    pub best_score: f64,
}

/// What a builder hands back.
pub enum BuiltClassifier {
    /// Use as-is.
    Ready(Box<dyn Classifier>),
    /// A search already ran; fit its best estimator.
    Searched(SearchOutcome),
}

impl BuiltClassifier {
    pub fn was_searched(&self) -> bool {
        matches!(self, BuiltClassifier::Searched(_))
    }

    /// The estimator to fit: the search winner if a search ran.
    pub fn into_estimator(self) -> Box<dyn Classifier> {
        match self {
            BuiltClassifier::Ready(estimator) => estimator,
            BuiltClassifier::Searched(outcome) => {
                log::trace!("using best searched estimator (score {:.4})", outcome.best_score);
                outcome.best_estimator
            }
        }
    }
}

impl fmt::Debug for BuiltClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltClassifier::Ready(c) => write!(f, "Ready({})", c.name()),
            BuiltClassifier::Searched(o) => {
                write!(f, "Searched({}, score={})", o.best_estimator.name(), o.best_score)
            }
        }
    }
}

/// Constructs a fresh, unfitted classifier for each fold.
pub trait ClassifierBuilder: Send + Sync {
    fn build(
        &self,
        kind: ClassifierKind,
        options: &BuildOptions,
    ) -> Result<BuiltClassifier, ClassifierError>;
}

/// Builder for the stock pipeline: percentile selection, standard scaling,
/// then a ridge classifier with a cross-validated penalty.
#[derive(Debug, Clone, Default)]
pub struct DefaultClassifierBuilder;

impl ClassifierBuilder for DefaultClassifierBuilder {
    fn build(
        &self,
        kind: ClassifierKind,
        options: &BuildOptions,
    ) -> Result<BuiltClassifier, ClassifierError> {
        let p = options.select_percentile;
        if !(p > 0.0 && p <= 100.0) {
            return Err(ClassifierError::InvalidPercentile(p));
        }
        match kind {
            ClassifierKind::Lr => Ok(BuiltClassifier::Ready(Box::new(LinearPipeline::new(
                SelectPercentile::new(p),
                StandardScaler::new(),
                RidgeClassifierCv::new(DEFAULT_ALPHAS.to_vec(), options.n_jobs),
            )))),
        }
    }
}

/// select → scale → ridge, each stage fitted on the training rows.
#[derive(Debug, Clone)]
pub struct LinearPipeline {
    selector: SelectPercentile,
    scaler: StandardScaler,
    model: RidgeClassifierCv,
}

impl LinearPipeline {
    pub fn new(selector: SelectPercentile, scaler: StandardScaler, model: RidgeClassifierCv) -> Self {
        LinearPipeline {
            selector,
            scaler,
            model,
        }
    }

    pub fn model(&self) -> &RidgeClassifierCv {
        &self.model
    }
}

impl Classifier for LinearPipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<(), ClassifierError> {
        if x.nrows() != y.len() {
            return Err(ClassifierError::LabelMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        self.selector.fit(x, y)?;
        let selected = self.selector.transform(x)?;
        self.scaler.fit(selected.view())?;
        let scaled = self.scaler.transform(selected.view())?;
        self.model.fit(scaled.view(), y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>, ClassifierError> {
        let selected = self.selector.transform(x)?;
        let scaled = self.scaler.transform(selected.view())?;
        self.model.predict(scaled.view())
    }

    fn name(&self) -> &str {
        "SelectPercentile+StandardScaler+RidgeClassifierCV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Constant(Label);

    impl Classifier for Constant {
        fn fit(&mut self, _x: ArrayView2<f64>, _y: &[Label]) -> Result<(), ClassifierError> {
            Ok(())
        }
        fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>, ClassifierError> {
            Ok(vec![self.0; x.nrows()])
        }
        fn name(&self) -> &str {
            "constant"
        }
    }

    #[test]
    fn test_kind_names_round_trip() {
        assert_eq!("lr".parse::<ClassifierKind>().unwrap(), ClassifierKind::Lr);
        assert_eq!(ClassifierKind::Lr.to_string(), "lr");
        assert!("svm".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn test_default_builder_returns_ready_pipeline() {
        let built = DefaultClassifierBuilder
            .build(ClassifierKind::Lr, &BuildOptions::default())
            .unwrap();
        assert!(!built.was_searched());

        let mut clf = built.into_estimator();
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]];
        let y = [0, 0, 0, 1, 1, 1];
        clf.fit(x.view(), &y).unwrap();
        assert_eq!(clf.predict(x.view()).unwrap(), y.to_vec());
    }

    #[test]
    fn test_searched_result_unwraps_to_best_estimator() {
        let built = BuiltClassifier::Searched(SearchOutcome {
            best_estimator: Box::new(Constant(9)),
            best_score: 0.75,
        });
        assert!(built.was_searched());
        let clf = built.into_estimator();
        assert_eq!(clf.name(), "constant");
        let x = array![[1.0], [2.0]];
        assert_eq!(clf.predict(x.view()).unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_invalid_percentile_rejected() {
        let options = BuildOptions {
            select_percentile: 0.0,
            n_jobs: 1,
        };
        assert!(matches!(
            DefaultClassifierBuilder.build(ClassifierKind::Lr, &options),
            Err(ClassifierError::InvalidPercentile(_))
        ));
    }

    #[test]
    fn test_pipeline_rejects_row_label_mismatch() {
        let mut clf = DefaultClassifierBuilder
            .build(ClassifierKind::Lr, &BuildOptions::default())
            .unwrap()
            .into_estimator();
        let x = array![[0.0], [1.0]];
        assert!(matches!(
            clf.fit(x.view(), &[0]),
            Err(ClassifierError::LabelMismatch { .. })
        ));
    }
}
