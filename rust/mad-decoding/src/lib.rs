//! mad-decoding: how well do per-trial dispersion features predict the trial
//! label?
//!
//! Pipeline: load `data/XY*.mat`, derive MAD-family features per trial,
//! score a ridge classifier under repeated stratified 5-fold cross-validation,
//! optionally build a label-permutation null distribution, and cache the
//! results as `.pkl` and `.mat` under `results/`.

pub mod config;
pub mod dataset;
pub mod evaluate;
pub mod matfile;
pub mod null;
pub mod run;
pub mod store;

pub use config::{Condition, ConfigError, DatasetSelector, NullConfig, RunConfig, RunKey};
pub use dataset::{load_dataset, Dataset, DatasetError};
pub use run::{run, RunError, RunOutcome};
pub use store::{DecodingResults, ResultPaths};
