//! Run configuration and the canonical key that names a run's results.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use decoding_core::{BuildOptions, ClassifierKind, Measure, RepeatedStratifiedKFold};

/// Folds per repeat.
pub const N_SPLITS: usize = 5;
/// Seed of the fold generator.
pub const SPLIT_SEED: u64 = 1;
/// Permutations in a null distribution.
pub const N_PERMS: usize = 10_000;
/// Base seed for null-distribution label permutations.
pub const DEFAULT_NULL_SEED: u64 = 0x6e75_6c6c_5eed_0001;
/// Univariate feature selection keeps this percentage of columns.
pub const SELECT_PERCENTILE: u32 = 100;
/// Classifiers evaluated by every run.
pub const CLASSIFIERS: [ClassifierKind; 1] = [ClassifierKind::Lr];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--distractor-diff data holds precomputed MAD features; measure {0} cannot be recomputed from it")]
    PrecomputedMeasure(Measure),

    #[error("--alt and --distractor-diff select different datasets; pass at most one")]
    ConflictingConditions,

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },

    #[error("feature-selection percentile must be in 1..=100, got {0}")]
    InvalidPercentile(u32),

    #[error("invalid data type tag '{0}': must be non-empty and free of path separators")]
    InvalidDtype(String),
}

/// Which recording condition the dataset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Condition {
    #[default]
    Standard,
    /// Alternate condition (`_a` files).
    Alternate,
    /// Distractor-difference data with MAD precomputed upstream.
    DistractorDiff,
}

impl Condition {
    /// Map `--alt` / `--distractor-diff` to a condition.
    ///
    /// Passing both is rejected. The legacy script let `--alt` win, loaded the
    /// `_a` file and then skipped feature derivation as if the input were
    /// distractor-diff data; that mix is not reproduced.
    pub fn from_flags(alt: bool, distractor_diff: bool) -> Result<Self, ConfigError> {
        match (alt, distractor_diff) {
            (false, false) => Ok(Condition::Standard),
            (true, false) => Ok(Condition::Alternate),
            (false, true) => Ok(Condition::DistractorDiff),
            (true, true) => Err(ConfigError::ConflictingConditions),
        }
    }

    /// File-name tag.
    pub fn tag(self) -> &'static str {
        match self {
            Condition::Standard => "",
            Condition::Alternate => "_a",
            Condition::DistractorDiff => "_distractors-diff",
        }
    }
}

/// Identifies one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSelector {
    pub short_irf: bool,
    pub condition: Condition,
    pub dtype: String,
}

impl Default for DatasetSelector {
    fn default() -> Self {
        DatasetSelector {
            short_irf: false,
            condition: Condition::Standard,
            dtype: "hit".to_string(),
        }
    }
}

impl DatasetSelector {
    pub fn irf_tag(&self) -> &'static str {
        if self.short_irf {
            "_2s"
        } else {
            ""
        }
    }

    /// `XY{irf_tag}{alt_tag}_{dtype}.mat`
    pub fn file_name(&self) -> String {
        format!("XY{}{}_{}.mat", self.irf_tag(), self.condition.tag(), self.dtype)
    }

    pub fn path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.file_name())
    }
}

/// Null-distribution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NullConfig {
    pub n_perms: usize,
    /// Permutation `i` draws from an RNG seeded by `(seed, i)`.
    pub seed: u64,
}

impl Default for NullConfig {
    fn default() -> Self {
        NullConfig {
            n_perms: N_PERMS,
            seed: DEFAULT_NULL_SEED,
        }
    }
}

/// Everything one invocation needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dataset: DatasetSelector,
    pub measure: Measure,
    /// Outer repeats of the stratified k-fold.
    pub n_repeats: usize,
    pub n_splits: usize,
    pub split_seed: u64,
    pub select_percentile: u32,
    /// Rayon workers; also handed to the classifier builder.
    pub n_jobs: usize,
    /// `Some` computes a permutation null distribution.
    pub null: Option<NullConfig>,
    pub overwrite: bool,
    /// Accepted for command-line compatibility; nothing is plotted.
    pub plot: bool,
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            dataset: DatasetSelector::default(),
            measure: Measure::Mad,
            n_repeats: 1,
            n_splits: N_SPLITS,
            split_seed: SPLIT_SEED,
            select_percentile: SELECT_PERCENTILE,
            n_jobs: 1,
            null: None,
            overwrite: false,
            plot: false,
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl RunConfig {
    /// Reject unusable option combinations. Touches no files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.condition == Condition::DistractorDiff && self.measure != Measure::Mad {
            return Err(ConfigError::PrecomputedMeasure(self.measure));
        }
        let dtype = &self.dataset.dtype;
        if dtype.is_empty() || dtype.contains(|c: char| c == '/' || c == '\\') || dtype == ".." {
            return Err(ConfigError::InvalidDtype(dtype.clone()));
        }
        check_min("outer-cv", 1, self.n_repeats)?;
        check_min("n_splits", 2, self.n_splits)?;
        check_min("n-jobs", 1, self.n_jobs)?;
        if let Some(null) = &self.null {
            check_min("n-perms", 1, null.n_perms)?;
        }
        if self.select_percentile == 0 || self.select_percentile > 100 {
            return Err(ConfigError::InvalidPercentile(self.select_percentile));
        }
        Ok(())
    }

    pub fn splitter(&self) -> RepeatedStratifiedKFold {
        RepeatedStratifiedKFold::new(self.n_splits, self.n_repeats, self.split_seed)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            select_percentile: self.select_percentile as f64,
            n_jobs: self.n_jobs,
        }
    }

    pub fn input_path(&self) -> PathBuf {
        self.dataset.path(&self.data_dir)
    }

    pub fn run_key(&self) -> RunKey {
        RunKey {
            dtype: self.dataset.dtype.clone(),
            short_irf: self.dataset.short_irf,
            condition: self.dataset.condition,
            measure: self.measure,
            n_repeats: self.n_repeats,
            n_splits: self.n_splits,
            split_seed: self.split_seed,
            select_percentile: self.select_percentile,
            classifiers: CLASSIFIERS.to_vec(),
            null: self.null,
        }
    }
}

fn check_min(name: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { name, min, value });
    }
    Ok(())
}

/// Every option that changes a run's numbers. Result files are named from it
/// and stamped with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunKey {
    pub dtype: String,
    pub short_irf: bool,
    pub condition: Condition,
    pub measure: Measure,
    pub n_repeats: usize,
    pub n_splits: usize,
    pub split_seed: u64,
    pub select_percentile: u32,
    pub classifiers: Vec<ClassifierKind>,
    pub null: Option<NullConfig>,
}

impl RunKey {
    /// Result file name without extension:
    /// `decoding_{dtype}{irf}{alt}_{measure}_{repeats}outer-cv{null}`, with
    /// extra suffixes only for settings that differ from the defaults.
    pub fn stem(&self) -> String {
        let irf_tag = if self.short_irf { "_2s" } else { "" };
        let mut stem = format!(
            "decoding_{}{}{}_{}_{}outer-cv",
            self.dtype,
            irf_tag,
            self.condition.tag(),
            self.measure,
            self.n_repeats
        );
        if let Some(null) = &self.null {
            stem.push_str("_with_nulldist");
            if null.n_perms != N_PERMS {
                stem.push_str(&format!("_{}perms", null.n_perms));
            }
            if null.seed != DEFAULT_NULL_SEED {
                stem.push_str(&format!("_null-seed{}", null.seed));
            }
        }
        if self.n_splits != N_SPLITS {
            stem.push_str(&format!("_{}splits", self.n_splits));
        }
        if self.split_seed != SPLIT_SEED {
            stem.push_str(&format!("_split-seed{}", self.split_seed));
        }
        if self.select_percentile != SELECT_PERCENTILE {
            stem.push_str(&format!("_top{}pct", self.select_percentile));
        }
        stem
    }

    /// Canonical JSON of the key.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stem_matches_legacy_names() {
        let config = RunConfig::default();
        assert_eq!(config.run_key().stem(), "decoding_hit_MAD_1outer-cv");

        let config = RunConfig {
            dataset: DatasetSelector {
                short_irf: true,
                condition: Condition::Alternate,
                dtype: "miss".into(),
            },
            measure: Measure::Mads,
            n_repeats: 20,
            null: Some(NullConfig::default()),
            ..RunConfig::default()
        };
        assert_eq!(
            config.run_key().stem(),
            "decoding_miss_2s_a_MADs_20outer-cv_with_nulldist"
        );
    }

    #[test]
    fn test_non_default_settings_extend_stem() {
        let config = RunConfig {
            null: Some(NullConfig {
                n_perms: 50,
                seed: 7,
            }),
            split_seed: 3,
            ..RunConfig::default()
        };
        assert_eq!(
            config.run_key().stem(),
            "decoding_hit_MAD_1outer-cv_with_nulldist_50perms_null-seed7_split-seed3"
        );
    }

    #[test]
    fn test_input_file_names() {
        let mut selector = DatasetSelector::default();
        assert_eq!(selector.file_name(), "XY_hit.mat");
        selector.condition = Condition::DistractorDiff;
        selector.short_irf = true;
        assert_eq!(selector.file_name(), "XY_2s_distractors-diff_hit.mat");
        assert_eq!(
            selector.path(Path::new("data")),
            Path::new("data").join("XY_2s_distractors-diff_hit.mat")
        );
    }

    #[test]
    fn test_distractor_diff_requires_mad() {
        for measure in [Measure::MaxAd, Measure::MeanAd, Measure::Mads] {
            let config = RunConfig {
                dataset: DatasetSelector {
                    condition: Condition::DistractorDiff,
                    ..DatasetSelector::default()
                },
                measure,
                ..RunConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::PrecomputedMeasure(m)) if m == measure
            ));
        }
    }

    #[test]
    fn test_condition_flags() {
        assert_eq!(Condition::from_flags(false, false).unwrap(), Condition::Standard);
        assert_eq!(Condition::from_flags(true, false).unwrap(), Condition::Alternate);
        assert_eq!(Condition::from_flags(false, true).unwrap(), Condition::DistractorDiff);
        assert!(matches!(
            Condition::from_flags(true, true),
            Err(ConfigError::ConflictingConditions)
        ));
    }

    #[test]
    fn test_zero_counts_rejected() {
        let config = RunConfig {
            n_repeats: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooSmall { name: "outer-cv", .. })));

        let config = RunConfig {
            null: Some(NullConfig { n_perms: 0, seed: 1 }),
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooSmall { name: "n-perms", .. })));

        let config = RunConfig {
            dataset: DatasetSelector {
                dtype: "../hit".into(),
                ..DatasetSelector::default()
            },
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDtype(_))));
    }

    #[test]
    fn test_fingerprint_tracks_every_field() {
        let base = RunConfig::default().run_key();
        let other = RunConfig {
            null: Some(NullConfig::default()),
            ..RunConfig::default()
        }
        .run_key();
        assert_ne!(base.fingerprint().unwrap(), other.fingerprint().unwrap());
        assert_eq!(base.fingerprint().unwrap(), RunConfig::default().run_key().fingerprint().unwrap());
    }
}
