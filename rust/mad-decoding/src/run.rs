//! One decoding run from configuration to saved results.

use decoding_core::{ClassifierBuilder, SplitError};

use crate::config::{ConfigError, RunConfig, RunKey, CLASSIFIERS};
use crate::dataset::{derive_dataset_features, load_dataset, DatasetError};
use crate::evaluate::{CrossValidation, EvalError};
use crate::null::null_distributions;
use crate::store::{load_cached, save, DecodingResults, ResultPaths, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("cannot split dataset: {0}")]
    Split(#[from] SplitError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("cannot save results: {0}")]
    Store(#[from] StoreError),

    #[error("cannot fingerprint run key: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct RunOutcome {
    pub results: DecodingResults,
    /// Results came from an existing file.
    pub cache_hit: bool,
    pub paths: ResultPaths,
    pub key: RunKey,
}

/// Validate, load, derive features, then either reuse cached results or
/// cross-validate (plus the optional null distribution) and save.
pub fn run(config: &RunConfig, builder: &dyn ClassifierBuilder) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let key = config.run_key();
    let fingerprint = key.fingerprint()?;
    let paths = ResultPaths::for_stem(&config.results_dir, &key.stem());
    if config.plot {
        log::debug!("--plot has no effect; results are only written to disk");
    }

    let dataset = load_dataset(&config.input_path())?;
    let features = derive_dataset_features(&dataset, config.dataset.condition, config.measure)?;

    if !config.overwrite {
        if let Some(results) = load_cached(&paths, &fingerprint)? {
            log::info!("Reusing cached results from {}", paths.pickle.display());
            return Ok(RunOutcome {
                results,
                cache_hit: true,
                paths,
                key,
            });
        }
    }

    let folds = config.splitter().split(&dataset.y)?;
    log::info!(
        "{} folds ({} repeats x {} splits, seed {})",
        folds.len(),
        config.n_repeats,
        config.n_splits,
        config.split_seed
    );
    let cv = CrossValidation {
        features: features.view(),
        labels: &dataset.y,
        folds: &folds,
        builder,
        options: config.build_options(),
    };

    let full_accs = cv.evaluate(&CLASSIFIERS)?;
    let full_accs_null = match &config.null {
        Some(null) => Some(null_distributions(&cv, &CLASSIFIERS, null)?),
        None => None,
    };

    let results = DecodingResults {
        full_accs,
        full_accs_null,
        run_key: Some(fingerprint),
    };
    save(&paths, &results)?;
    Ok(RunOutcome {
        results,
        cache_hit: false,
        paths,
        key,
    })
}
