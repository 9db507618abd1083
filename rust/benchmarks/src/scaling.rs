//! Scaling runs for the decoding pipeline.
//!
//! Times one cross-validation pass against the number of trials and features,
//! and a fixed-size null distribution against the worker count, then reports
//! empirical exponents from log-log fits.

use std::time::Instant;

use decoding_core::synthetic::dispersion_trials;
use decoding_core::{
    derive_features, BuildOptions, ClassifierKind, DefaultClassifierBuilder, Measure,
    RepeatedStratifiedKFold,
};
use mad_decoding::config::NullConfig;
use mad_decoding::evaluate::CrossValidation;
use mad_decoding::null::null_distribution;

const SEED: u64 = 12345;
const NULL_PERMS: usize = 200;

fn main() {
    println!("================================================================");
    println!("  SCALING: cross-validated decoding and permutation nulls");
    println!("================================================================\n");

    scale_trials();
    scale_features();
    scale_workers();
}

// ============================================================================
// Trials
// ============================================================================

fn scale_trials() {
    println!("  Cross-validation time vs trials (50 samples, MAD, 5 folds):");
    println!("  {:>8} {:>12} {:>10}", "trials", "time_us", "accuracy");
    println!("  {}", "-".repeat(34));

    let mut points = Vec::new();
    for n_obs in [100usize, 200, 400, 800, 1600, 3200] {
        let (x, y) = dispersion_trials(n_obs, 50, 0.5, SEED);
        let features = match derive_features(&x, Measure::Mad) {
            Ok(f) => f,
            Err(e) => {
                println!("  {:>8} ERROR {}", n_obs, e);
                continue;
            }
        };
        let folds = match RepeatedStratifiedKFold::default().split(&y) {
            Ok(f) => f,
            Err(e) => {
                println!("  {:>8} ERROR {}", n_obs, e);
                continue;
            }
        };
        let cv = CrossValidation {
            features: features.view(),
            labels: &y,
            folds: &folds,
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };

        let start = Instant::now();
        let result = cv.mean_accuracy(ClassifierKind::Lr, None);
        let us = start.elapsed().as_micros();
        match result {
            Ok(acc) => {
                println!("  {:>8} {:>12} {:>10.4}", n_obs, us, acc);
                points.push((n_obs as f64, us as f64));
            }
            Err(e) => println!("  {:>8} {:>12} ERROR {}", n_obs, us, e),
        }
    }
    report_exponent("trials", &points);
}

// ============================================================================
// Features
// ============================================================================

fn scale_features() {
    println!("  Cross-validation time vs feature columns (400 trials):");
    println!("  {:>8} {:>12} {:>10}", "columns", "time_us", "accuracy");
    println!("  {}", "-".repeat(34));

    let mut points = Vec::new();
    for n_cols in [1usize, 4, 16, 64, 256] {
        // Distractor-style input: raw columns used directly as features.
        let (x, y) = dispersion_trials(400, n_cols, 0.5, SEED);
        let folds = match RepeatedStratifiedKFold::default().split(&y) {
            Ok(f) => f,
            Err(e) => {
                println!("  {:>8} ERROR {}", n_cols, e);
                continue;
            }
        };
        let cv = CrossValidation {
            features: x.view(),
            labels: &y,
            folds: &folds,
            builder: &DefaultClassifierBuilder,
            options: BuildOptions::default(),
        };

        let start = Instant::now();
        let result = cv.mean_accuracy(ClassifierKind::Lr, None);
        let us = start.elapsed().as_micros();
        match result {
            Ok(acc) => {
                println!("  {:>8} {:>12} {:>10.4}", n_cols, us, acc);
                points.push((n_cols as f64, us as f64));
            }
            Err(e) => println!("  {:>8} {:>12} ERROR {}", n_cols, us, e),
        }
    }
    report_exponent("columns", &points);
}

// ============================================================================
// Workers
// ============================================================================

fn scale_workers() {
    println!(
        "  Null distribution time vs workers ({} permutations, 200 trials):",
        NULL_PERMS
    );
    println!("  {:>8} {:>12} {:>10} {:>10}", "workers", "time_ms", "speedup", "null_mean");
    println!("  {}", "-".repeat(44));

    let (x, y) = dispersion_trials(200, 50, 0.0, SEED);
    let (features, folds) = match (
        derive_features(&x, Measure::Mad),
        RepeatedStratifiedKFold::default().split(&y),
    ) {
        (Ok(f), Ok(folds)) => (f, folds),
        _ => {
            println!("  could not prepare dataset");
            return;
        }
    };
    let cv = CrossValidation {
        features: features.view(),
        labels: &y,
        folds: &folds,
        builder: &DefaultClassifierBuilder,
        options: BuildOptions::default(),
    };
    let config = NullConfig {
        n_perms: NULL_PERMS,
        ..NullConfig::default()
    };

    let max_workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    let mut baseline_ms = None;
    let mut reference: Option<Vec<f64>> = None;
    let mut workers = 1;
    while workers <= max_workers {
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(p) => p,
            Err(e) => {
                println!("  {:>8} ERROR {}", workers, e);
                break;
            }
        };
        let start = Instant::now();
        let result = pool.install(|| null_distribution(&cv, ClassifierKind::Lr, &config));
        let ms = start.elapsed().as_secs_f64() * 1e3;

        match result {
            Ok(dist) => {
                let base = *baseline_ms.get_or_insert(ms);
                let mean = dist.iter().sum::<f64>() / dist.len() as f64;
                println!("  {:>8} {:>12.1} {:>9.2}x {:>10.4}", workers, ms, base / ms, mean);
                match &reference {
                    Some(r) if r != &dist => println!("  WARNING: distribution differs from 1-worker run"),
                    Some(_) => {}
                    None => reference = Some(dist),
                }
            }
            Err(e) => println!("  {:>8} {:>12.1} ERROR {}", workers, ms, e),
        }
        workers *= 2;
    }
    println!();
}

/// Least-squares slope of log(time) against log(size).
fn report_exponent(label: &str, points: &[(f64, f64)]) {
    if points.len() < 2 {
        println!();
        return;
    }
    let logs: Vec<(f64, f64)> = points.iter().map(|&(s, t)| (s.ln(), t.max(1.0).ln())).collect();
    let n = logs.len() as f64;
    let mx = logs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = logs.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = logs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let sxx: f64 = logs.iter().map(|p| (p.0 - mx).powi(2)).sum();
    println!("  empirical exponent in {}: {:.2}\n", label, sxy / sxx);
}
