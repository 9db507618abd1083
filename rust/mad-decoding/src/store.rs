//! Result files: a pickle record that doubles as the cache, and a MATLAB
//! export of the same numbers.
//!
//! The pickle holds a dict with `full_accs` (classifier name → mean accuracy),
//! optionally `full_accs_null` (classifier name → null accuracies), and the
//! `run_key` fingerprint of the configuration that produced it.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions};

use crate::matfile::{write_mat, MatError, MatFile, MatValue, NumericArray, StructArray};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pickle encoding failed: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[error("cannot decode existing results {path} (pass --overwrite to replace them): {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },

    #[error("MAT export failed: {0}")]
    Mat(#[from] MatError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingResults {
    pub full_accs: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_accs_null: Option<BTreeMap<String, Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_key: Option<String>,
}

impl DecodingResults {
    /// MATLAB variables: one struct per mapping, one field per classifier.
    pub fn to_mat(&self) -> MatFile {
        let mut file = MatFile::new();
        let accs = self
            .full_accs
            .iter()
            .map(|(name, &acc)| (name.clone(), MatValue::Numeric(NumericArray::scalar(acc))))
            .collect();
        file.push("full_accs", MatValue::Struct(StructArray::scalar(accs)));
        if let Some(null) = &self.full_accs_null {
            let fields = null
                .iter()
                .map(|(name, accs)| (name.clone(), MatValue::Numeric(NumericArray::row(accs.clone()))))
                .collect();
            file.push("full_accs_null", MatValue::Struct(StructArray::scalar(fields)));
        }
        file
    }
}

/// Where one run's results live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    pub pickle: PathBuf,
    pub matlab: PathBuf,
}

impl ResultPaths {
    pub fn for_stem(results_dir: &Path, stem: &str) -> Self {
        ResultPaths {
            pickle: results_dir.join(format!("{}.pkl", stem)),
            matlab: results_dir.join(format!("{}.mat", stem)),
        }
    }
}

/// Previously saved results for `fingerprint`, if any. A record stamped with
/// a different fingerprint is reported and ignored so the caller recomputes;
/// an existing file that cannot be opened or decoded is an error and is left
/// untouched.
pub fn load_cached(
    paths: &ResultPaths,
    fingerprint: &str,
) -> Result<Option<DecodingResults>, StoreError> {
    if !paths.pickle.exists() {
        return Ok(None);
    }
    let file = File::open(&paths.pickle).map_err(|source| StoreError::Io {
        path: paths.pickle.clone(),
        source,
    })?;
    let results: DecodingResults = serde_pickle::from_reader(BufReader::new(file), DeOptions::new())
        .map_err(|source| StoreError::Decode {
            path: paths.pickle.clone(),
            source,
        })?;
    match results.run_key.as_deref() {
        Some(stored) if stored != fingerprint => {
            log::warn!(
                "{} was produced by a different configuration; recomputing",
                paths.pickle.display()
            );
            Ok(None)
        }
        _ => Ok(Some(results)),
    }
}

/// Write both result files, creating the results directory if needed.
pub fn save(paths: &ResultPaths, results: &DecodingResults) -> Result<(), StoreError> {
    if let Some(dir) = paths.pickle.parent() {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let io_err = |source: std::io::Error| StoreError::Io {
        path: paths.pickle.clone(),
        source,
    };
    let file = File::create(&paths.pickle).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_pickle::to_writer(&mut writer, results, SerOptions::new())?;
    writer.flush().map_err(io_err)?;

    write_mat(&paths.matlab, &results.to_mat(), true)?;
    log::info!("Saved results to {}", paths.pickle.display());
    Ok(())
}
