//! mad-decoding CLI: decode trial labels from per-trial dispersion features.
//!
//! Reads `{data-dir}/XY{irf}{alt}_{dtype}.mat`, derives the chosen measure per
//! trial, cross-validates the classifier and writes
//! `{results-dir}/decoding_{dtype}{irf}{alt}_{measure}_{n}outer-cv{null}.{pkl,mat}`.
//! Existing results are reused unless `--overwrite` is given.
//!
//! Examples:
//!   mad-decoding --dtype hit --measure MADs --outer-cv 20
//!   mad-decoding --short-irf --alt --compute-nulldist --n-jobs 8

use std::path::PathBuf;

use clap::Parser;

use decoding_core::{DefaultClassifierBuilder, Measure, NullSummary};
use mad_decoding::config::{
    Condition, ConfigError, DatasetSelector, NullConfig, RunConfig, DEFAULT_NULL_SEED, N_PERMS,
};
use mad_decoding::run::run;

#[derive(Parser, Debug)]
#[command(name = "mad-decoding", about = "Cross-validated decoding from MAD features")]
struct Cli {
    /// Use the alternate-condition dataset (`_a`).
    #[arg(long)]
    alt: bool,

    /// Use distractor-difference data (precomputed MAD features).
    #[arg(long)]
    distractor_diff: bool,

    /// Use the short-IRF dataset (`_2s`).
    #[arg(long)]
    short_irf: bool,

    /// Data-type tag in the input file name.
    #[arg(long, default_value = "hit")]
    dtype: String,

    /// Worker threads.
    #[arg(long, default_value_t = 1)]
    n_jobs: usize,

    /// Accepted for compatibility; nothing is plotted.
    #[arg(long)]
    plot: bool,

    /// Repeats of the stratified 5-fold cross-validation.
    #[arg(long, default_value_t = 1)]
    outer_cv: usize,

    /// MAD, MaxAD, MeanAD or MADs.
    #[arg(long, default_value = "MAD")]
    measure: Measure,

    /// Recompute even if results exist.
    #[arg(long)]
    overwrite: bool,

    /// Also compute a permutation null distribution.
    #[arg(long)]
    compute_nulldist: bool,

    /// Permutations in the null distribution.
    #[arg(long, default_value_t = N_PERMS)]
    n_perms: usize,

    /// Base seed for null permutations.
    #[arg(long, default_value_t = DEFAULT_NULL_SEED)]
    null_seed: u64,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let condition = Condition::from_flags(self.alt, self.distractor_diff)?;
        let null = self.compute_nulldist.then_some(NullConfig {
            n_perms: self.n_perms,
            seed: self.null_seed,
        });
        Ok(RunConfig {
            dataset: DatasetSelector {
                short_irf: self.short_irf,
                condition,
                dtype: self.dtype,
            },
            measure: self.measure,
            n_repeats: self.outer_cv,
            n_jobs: self.n_jobs,
            null,
            overwrite: self.overwrite,
            plot: self.plot,
            data_dir: self.data_dir,
            results_dir: self.results_dir,
            ..RunConfig::default()
        })
    }
}

fn main() {
    env_logger::init();

    let config = match Cli::parse().into_config().and_then(|c| c.validate().map(|_| c)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("========================================");
    println!("  mad-decoding: {} decoding", config.measure);
    println!("========================================");
    println!();
    println!("  Input:    {}", config.input_path().display());
    println!("  Measure:  {}", config.measure);
    println!("  Outer CV: {} x {}-fold", config.n_repeats, config.n_splits);
    if let Some(null) = &config.null {
        println!("  Null:     {} permutations (seed {})", null.n_perms, null.seed);
    }
    println!("  Workers:  {}", config.n_jobs);
    println!();

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_jobs)
        .build_global()
    {
        log::warn!("Could not size the global thread pool: {}", e);
    }

    let outcome = match run(&config, &DefaultClassifierBuilder) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if outcome.cache_hit {
        println!("Loaded existing results: {}", outcome.paths.pickle.display());
    } else {
        println!("Saved: {}", outcome.paths.pickle.display());
        println!("       {}", outcome.paths.matlab.display());
    }
    println!();
    println!("  {:<12} | {:>10}", "classifier", "accuracy");
    println!("  {:-<12}-+-{:->10}", "", "");
    for (name, acc) in &outcome.results.full_accs {
        println!("  {:<12} | {:>10.4}", name, acc);
    }

    if let Some(null) = &outcome.results.full_accs_null {
        println!();
        println!(
            "  {:<12} | {:>8} | {:>8} | {:>8} | {:>8}",
            "classifier", "null μ", "null σ", "null p95", "p"
        );
        for (name, dist) in null {
            let Some(&observed) = outcome.results.full_accs.get(name) else {
                continue;
            };
            let s = NullSummary::compute(observed, dist);
            println!(
                "  {:<12} | {:>8.4} | {:>8.4} | {:>8.4} | {:>8.4}{}",
                name,
                s.null_mean,
                s.null_std,
                s.null_p95,
                s.p_value,
                if s.significant_at(0.05) { " *" } else { "" }
            );
        }
    }

    println!();
    println!("========================================");
    println!("  Done.");
    println!("========================================");
}
