//! Validation Suite (C7): out-of-sample, walk-forward, sensitivity, and
//! Monte Carlo robustness checks.
//!
//! Every protocol here is generic over a caller-supplied analyzer rather
//! than tied to any one strategy or backtest shape — the suite only
//! needs a bar slice in and a named metric out.

use std::collections::BTreeMap;

use bquant_core::rng::SeedHierarchy;
use bquant_core::types::Bar;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

use crate::error::ValidationError;
use crate::result::ValidationResult;

/// Runs an analysis over a bar slice and returns named scalar metrics.
///
/// Implement this directly for stateful analyzers, or wrap a plain closure
/// with [`FnAnalyzer`].
pub trait Analyzer {
    fn analyze(&self, bars: &[Bar]) -> Result<BTreeMap<String, f64>, String>;
}

/// Adapts an infallible `Fn(&[Bar]) -> BTreeMap<String, f64>` closure into
/// an [`Analyzer`].
pub struct FnAnalyzer<F>(pub F);

impl<F> Analyzer for FnAnalyzer<F>
where
    F: Fn(&[Bar]) -> BTreeMap<String, f64>,
{
    fn analyze(&self, bars: &[Bar]) -> Result<BTreeMap<String, f64>, String> {
        Ok((self.0)(bars))
    }
}

/// Same contract as [`Analyzer`] but parameterized for the sensitivity grid.
pub trait ParamAnalyzer {
    fn analyze_with_params(
        &self,
        bars: &[Bar],
        params: &BTreeMap<String, f64>,
    ) -> Result<BTreeMap<String, f64>, String>;
}

fn metric_or_err(
    metrics: Result<BTreeMap<String, f64>, String>,
    metric: &str,
    protocol: &str,
) -> Result<f64, ValidationError> {
    let metrics = metrics.map_err(|reason| ValidationError {
        protocol: protocol.to_string(),
        reason,
    })?;
    metrics
        .get(metric)
        .copied()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError {
            protocol: protocol.to_string(),
            reason: format!("analyzer did not return a finite value for metric '{metric}'"),
        })
}

/// Fixed train/test split at `train_ratio` (default 0.7 is the caller's
/// choice, not assumed here).
pub fn out_of_sample<A: Analyzer>(
    analyzer: &A,
    bars: &[Bar],
    metric: &str,
    train_ratio: f64,
    threshold: f64,
) -> Result<ValidationResult, ValidationError> {
    let protocol = "out_of_sample";
    if !(0.0..1.0).contains(&train_ratio) || train_ratio <= 0.0 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: format!("train_ratio must be in (0, 1), got {train_ratio}"),
        });
    }
    let split = ((bars.len() as f64) * train_ratio).round() as usize;
    if split < 2 || bars.len() - split < 2 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: format!(
                "insufficient data for a {train_ratio} split of {} bars",
                bars.len()
            ),
        });
    }

    let (train, test) = bars.split_at(split);
    let train_metric = metric_or_err(analyzer.analyze(train), metric, protocol)?;
    let test_metric = metric_or_err(analyzer.analyze(test), metric, protocol)?;

    if train_metric.abs() < 1e-12 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: "train metric is ~0, degradation percentage is undefined".into(),
        });
    }
    let degradation_pct = (train_metric - test_metric) / train_metric.abs() * 100.0;
    let success = degradation_pct.abs() <= threshold * 100.0;

    Ok(ValidationResult::new(protocol, success)
        .with_metric("train_metric", train_metric)
        .with_metric("test_metric", test_metric)
        .with_metric("degradation_pct", degradation_pct)
        .with_meta("train_ratio", train_ratio)
        .with_meta("metric", metric.to_string()))
}

/// Rolling `(train_window, test_window, step_size)` folds over the index.
pub fn walk_forward<A: Analyzer>(
    analyzer: &A,
    bars: &[Bar],
    metric: &str,
    train_window: usize,
    test_window: usize,
    step_size: usize,
    threshold: f64,
) -> Result<ValidationResult, ValidationError> {
    let protocol = "walk_forward";
    if step_size == 0 || train_window == 0 || test_window == 0 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: "train_window, test_window, and step_size must all be > 0".into(),
        });
    }
    if bars.len() < train_window + test_window {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: format!(
                "{} bars is not enough for a train_window={train_window} + test_window={test_window} fold",
                bars.len()
            ),
        });
    }

    let n_iterations = (bars.len() - train_window - test_window) / step_size + 1;
    let mut train_metrics = Vec::with_capacity(n_iterations);
    let mut test_metrics = Vec::with_capacity(n_iterations);

    for i in 0..n_iterations {
        let train_start = i * step_size;
        let train_end = train_start + train_window;
        let test_end = train_end + test_window;
        let train_slice = &bars[train_start..train_end];
        let test_slice = &bars[train_end..test_end];
        train_metrics.push(metric_or_err(analyzer.analyze(train_slice), metric, protocol)?);
        test_metrics.push(metric_or_err(analyzer.analyze(test_slice), metric, protocol)?);
    }

    let mean_train = bquant_core::mathutil::mean(&train_metrics);
    let mean_test = bquant_core::mathutil::mean(&test_metrics);
    let std_train = bquant_core::mathutil::std_dev(&train_metrics);
    let std_test = bquant_core::mathutil::std_dev(&test_metrics);

    if mean_train.abs() < 1e-12 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: "mean train metric is ~0, degradation percentage is undefined".into(),
        });
    }
    let degradation_pct = (mean_train - mean_test) / mean_train.abs() * 100.0;
    let success = degradation_pct.abs() <= threshold * 100.0;

    Ok(ValidationResult::new(protocol, success)
        .with_metric("mean_train_metric", mean_train)
        .with_metric("mean_test_metric", mean_test)
        .with_metric("std_train_metric", std_train)
        .with_metric("std_test_metric", std_test)
        .with_metric("degradation_pct", degradation_pct)
        .with_meta("n_iterations", n_iterations as i64)
        .with_meta("metric", metric.to_string()))
}

/// Full Cartesian product over `param_ranges`, with stability defined by
/// coefficient of variation. Each combination is independent of the others,
/// so the grid is evaluated with Rayon (`par_iter`) rather than a serial
/// `for` loop.
pub fn sensitivity<A: ParamAnalyzer + Sync>(
    analyzer: &A,
    bars: &[Bar],
    metric: &str,
    param_ranges: &BTreeMap<String, Vec<f64>>,
) -> Result<ValidationResult, ValidationError> {
    let protocol = "sensitivity";
    if param_ranges.is_empty() || param_ranges.values().any(|v| v.is_empty()) {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: "param_ranges must be non-empty with at least one value per parameter".into(),
        });
    }

    let names: Vec<&String> = param_ranges.keys().collect();
    let mut combinations: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new()];
    for name in &names {
        let values = &param_ranges[*name];
        let mut next = Vec::with_capacity(combinations.len() * values.len());
        for combo in &combinations {
            for v in values {
                let mut extended = combo.clone();
                extended.insert((*name).clone(), *v);
                next.push(extended);
            }
        }
        combinations = next;
    }

    let evaluated: Vec<Result<f64, ValidationError>> = combinations
        .par_iter()
        .map(|combo| {
            let metrics = analyzer.analyze_with_params(bars, combo).map_err(|reason| ValidationError {
                protocol: protocol.to_string(),
                reason,
            })?;
            metrics
                .get(metric)
                .copied()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ValidationError {
                    protocol: protocol.to_string(),
                    reason: format!("analyzer did not return a finite value for metric '{metric}'"),
                })
        })
        .collect();

    let mut values = Vec::with_capacity(combinations.len());
    let mut best: Option<(BTreeMap<String, f64>, f64)> = None;
    let mut worst: Option<(BTreeMap<String, f64>, f64)> = None;
    for (combo, value) in combinations.iter().zip(evaluated) {
        let value = value?;
        values.push(value);
        let is_new_best = match &best {
            Some((_, b)) => value > *b,
            None => true,
        };
        if is_new_best {
            best = Some((combo.clone(), value));
        }
        let is_new_worst = match &worst {
            Some((_, w)) => value < *w,
            None => true,
        };
        if is_new_worst {
            worst = Some((combo.clone(), value));
        }
    }

    let mean = bquant_core::mathutil::mean(&values);
    let std = bquant_core::mathutil::std_dev(&values);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let stability_score = if mean.abs() > 1e-12 { 1.0 - std / mean.abs() } else { 0.0 };
    let success = stability_score > 0.8;

    let mut result = ValidationResult::new(protocol, success)
        .with_metric("mean", mean)
        .with_metric("std", std)
        .with_metric("min", min)
        .with_metric("max", max)
        .with_metric("stability_score", stability_score)
        .with_meta("n_combinations", combinations.len() as i64)
        .with_meta("metric", metric.to_string());
    if let Some((combo, value)) = best {
        result = result.with_meta("best_params", format_params(&combo)).with_metric("best_value", value);
    }
    if let Some((combo, value)) = worst {
        result = result.with_meta("worst_params", format_params(&combo)).with_metric("worst_value", value);
    }
    Ok(result)
}

fn format_params(combo: &BTreeMap<String, f64>) -> String {
    combo
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleMethod {
    Returns,
    Prices,
    Full,
}

/// Compares the real metric against a synthetic distribution built by
/// shuffling or resampling the bar history. Trials are independent given
/// their own seeded RNG, so they run over Rayon (`par_iter`) rather than a
/// serial `for` loop.
pub fn monte_carlo<A: Analyzer + Sync>(
    analyzer: &A,
    bars: &[Bar],
    metric: &str,
    n_simulations: usize,
    method: ShuffleMethod,
    seed: u64,
) -> Result<ValidationResult, ValidationError> {
    let protocol = "monte_carlo";
    if bars.len() < 2 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: "need at least 2 bars to derive a return series".into(),
        });
    }

    let real_metric = metric_or_err(analyzer.analyze(bars), metric, protocol)?;

    let hierarchy = SeedHierarchy::new(seed);
    let successes: Vec<f64> = (0..n_simulations)
        .into_par_iter()
        .filter_map(|trial| {
            let mut rng = hierarchy.monte_carlo_rng(trial);
            let synthetic = synthesize_bars(bars, method, &mut rng);
            analyzer
                .analyze(&synthetic)
                .ok()
                .and_then(|metrics| metrics.get(metric).copied().filter(|v| v.is_finite()))
        })
        .collect();

    if successes.len() < 10 {
        return Err(ValidationError {
            protocol: protocol.to_string(),
            reason: format!(
                "only {} of {n_simulations} simulations succeeded, need at least 10",
                successes.len()
            ),
        });
    }

    let mean = bquant_core::mathutil::mean(&successes);
    let std = bquant_core::mathutil::std_dev(&successes);
    let z_score = if std > 1e-12 { (real_metric - mean) / std } else { 0.0 };
    let percentile = successes.iter().filter(|&&v| v <= real_metric).count() as f64 / successes.len() as f64;
    let p95 = bquant_core::mathutil::quantile(&successes, 0.95);
    let success = real_metric > p95;

    Ok(ValidationResult::new(protocol, success)
        .with_metric("real_metric", real_metric)
        .with_metric("synthetic_mean", mean)
        .with_metric("synthetic_std", std)
        .with_metric("z_score", z_score)
        .with_metric("percentile", percentile)
        .with_metric("p95_cutoff", p95)
        .with_meta("n_successful", successes.len() as i64)
        .with_meta("shuffle_method", format!("{method:?}"))
        .with_meta("metric", metric.to_string()))
}

fn log_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| (w[1].close / w[0].close).ln())
        .collect()
}

fn synthesize_bars(bars: &[Bar], method: ShuffleMethod, rng: &mut impl Rng) -> Vec<Bar> {
    match method {
        ShuffleMethod::Returns => {
            let mut returns = log_returns(bars);
            returns.shuffle(rng);
            let mut close = bars[0].close;
            let mut out = Vec::with_capacity(bars.len());
            out.push(scale_bar(&bars[0], 1.0));
            for (i, r) in returns.iter().enumerate() {
                close *= r.exp();
                let scale = close / bars[i + 1].close;
                out.push(scale_bar(&bars[i + 1], scale));
            }
            out
        }
        ShuffleMethod::Prices => {
            let mut indices: Vec<usize> = (0..bars.len()).collect();
            indices.shuffle(rng);
            indices
                .iter()
                .zip(bars)
                .map(|(&src, timestamp_source)| {
                    let mut bar = bars[src];
                    bar.timestamp = timestamp_source.timestamp;
                    bar
                })
                .collect()
        }
        ShuffleMethod::Full => {
            let returns = log_returns(bars);
            let std = bquant_core::mathutil::std_dev(&returns);
            let avg_range_pct = bquant_core::mathutil::mean(
                &bars.iter().map(|b| (b.high - b.low) / b.close).collect::<Vec<_>>(),
            );
            let mut out = Vec::with_capacity(bars.len());
            let mut close = bars[0].close;
            out.push(scale_bar(&bars[0], 1.0));
            for b in &bars[1..] {
                let z = standard_normal(rng);
                let prev_close = close;
                close *= (std * z).exp();
                let open = prev_close;
                let half_range = close.max(open) * avg_range_pct / 2.0;
                out.push(Bar {
                    timestamp: b.timestamp,
                    open,
                    high: open.max(close) + half_range,
                    low: open.min(close) - half_range,
                    close,
                    volume: b.volume,
                });
            }
            out
        }
    }
}

fn scale_bar(bar: &Bar, scale: f64) -> Bar {
    Bar {
        timestamp: bar.timestamp,
        open: bar.open * scale,
        high: bar.high * scale,
        low: bar.low * scale,
        close: bar.close * scale,
        volume: bar.volume,
    }
}

/// Box-Muller transform for a single standard normal draw.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
