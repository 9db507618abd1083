//! Shared building blocks for decoding analyses: dispersion features,
//! stratified cross-validation splits, and ridge-regularised linear
//! classification.

pub mod classifier;
pub mod measures;
pub mod preprocess;
pub mod ridge;
pub mod split;
pub mod stats;
pub mod synthetic;

/// Categorical class label.
pub type Label = i64;

pub use classifier::{
    BuildOptions, BuiltClassifier, Classifier, ClassifierBuilder, ClassifierError, ClassifierKind,
    DefaultClassifierBuilder, LinearPipeline, SearchOutcome,
};
pub use measures::{derive_features, Measure, MeasureError};
pub use ridge::RidgeClassifierCv;
pub use split::{Fold, RepeatedStratifiedKFold, SplitError};
pub use stats::{accuracy, empirical_p_value, NullSummary};
