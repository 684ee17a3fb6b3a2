//! Statistical Test Suite (C5): hypothesis tests over sequences of zone
//! feature records (§4.5).
//!
//! Every test shares an alpha and returns a `HypothesisTestResult`; `run_all`
//! captures a failing test's `StatisticalError` into a `significant=false`
//! placeholder slot rather than aborting the whole suite (§7).

use std::collections::BTreeMap;

use bquant_core::mathutil::mean;
use bquant_core::types::{FeatureRecord, Scalar, ZoneType};

use crate::error::StatisticalError;
use crate::result::{HypothesisTestResult, TestSuiteResults};
use crate::stats_math::{
    adf_test, bonferroni, chi_square_uniform_gof, fisher_z_ci, holm_bonferroni, mann_whitney_u,
    normality_test, pearson_correlation, quantile, runs_test, t_two_sided_p, two_sample_t_test,
};

const VOLATILITY_KEY: &str = "volatility_score";

fn pairs(records: &[FeatureRecord], a: &str, b: &str) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for r in records {
        if let (Some(x), Some(y)) = (r.get_f64(a), r.get_f64(b)) {
            if x.is_finite() && y.is_finite() {
                xs.push(x);
                ys.push(y);
            }
        }
    }
    (xs, ys)
}

fn correlation_test(xs: &[f64], ys: &[f64]) -> Option<(f64, f64, f64)> {
    let n = xs.len();
    if n < 3 {
        return None;
    }
    let r = pearson_correlation(xs, ys);
    let df = (n - 2) as f64;
    if (1.0 - r * r).abs() < 1e-15 {
        return Some((r, f64::INFINITY, 0.0));
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    let p = t_two_sided_p(t, df);
    Some((r, t, p))
}

/// Split by top/bottom 20% of `duration`; two-sample t-test on `price_return`.
pub fn test_duration_vs_return(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let durations: Vec<f64> = records.iter().map(|r| r.duration as f64).collect();
    if durations.len() < 10 {
        return Err(StatisticalError::new("duration_vs_return", "fewer than 10 zones"));
    }
    let hi = quantile(&durations, 0.8);
    let lo = quantile(&durations, 0.2);
    let top: Vec<f64> = records.iter().filter(|r| r.duration as f64 >= hi).map(|r| r.price_return).collect();
    let bottom: Vec<f64> = records.iter().filter(|r| r.duration as f64 <= lo).map(|r| r.price_return).collect();
    let fit = two_sample_t_test(&top, &bottom)
        .ok_or_else(|| StatisticalError::new("duration_vs_return", "top/bottom duration groups too small"))?;
    Ok(HypothesisTestResult::new(
        "duration_vs_return",
        "two_sample_t_test",
        fit.t_statistic,
        fit.p_value,
        alpha,
        top.len() + bottom.len(),
    )
    .with_effect_size(fit.cohens_d)
    .with_meta("top_n", top.len() as i64)
    .with_meta("bottom_n", bottom.len() as i64))
}

/// Pearson correlation between `hist_slope` and `duration`, with Fisher-z CI.
pub fn test_slope_duration_correlation(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let (slopes, durations) = pairs(records, "hist_slope", "duration");
    let (r, t, p) = correlation_test(&slopes, &durations)
        .ok_or_else(|| StatisticalError::new("slope_duration_correlation", "fewer than 3 zones with hist_slope present"))?;
    let ci = fisher_z_ci(r, slopes.len(), alpha);
    Ok(HypothesisTestResult::new("slope_duration_correlation", "pearson_correlation", t, p, alpha, slopes.len())
        .with_effect_size(r)
        .with_confidence_interval(ci))
}

/// Two-sample tests on `duration` and `price_return` between bull and bear
/// zones; combined p via Bonferroni over the two comparisons.
pub fn test_bull_bear_asymmetry(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let bull: Vec<&FeatureRecord> = records.iter().filter(|r| r.zone_type == ZoneType::Bull).collect();
    let bear: Vec<&FeatureRecord> = records.iter().filter(|r| r.zone_type == ZoneType::Bear).collect();
    if bull.len() < 2 || bear.len() < 2 {
        return Err(StatisticalError::new("bull_bear_asymmetry", "fewer than 2 bull or bear zones"));
    }

    let bull_durations: Vec<f64> = bull.iter().map(|r| r.duration as f64).collect();
    let bear_durations: Vec<f64> = bear.iter().map(|r| r.duration as f64).collect();
    let bull_returns: Vec<f64> = bull.iter().map(|r| r.price_return).collect();
    let bear_returns: Vec<f64> = bear.iter().map(|r| r.price_return).collect();

    let duration_fit = two_sample_t_test(&bull_durations, &bear_durations)
        .ok_or_else(|| StatisticalError::new("bull_bear_asymmetry", "duration t-test failed"))?;
    let return_fit = two_sample_t_test(&bull_returns, &bear_returns)
        .ok_or_else(|| StatisticalError::new("bull_bear_asymmetry", "return t-test failed"))?;

    let combined_p = bonferroni(&[duration_fit.p_value, return_fit.p_value]);

    Ok(HypothesisTestResult::new(
        "bull_bear_asymmetry",
        "two_sample_t_test (bonferroni combined)",
        return_fit.t_statistic,
        combined_p,
        alpha,
        bull.len() + bear.len(),
    )
    .with_effect_size(return_fit.cohens_d)
    .with_meta("duration_t_statistic", duration_fit.t_statistic)
    .with_meta("duration_p_value", duration_fit.p_value)
    .with_meta("return_t_statistic", return_fit.t_statistic)
    .with_meta("return_p_value", return_fit.p_value))
}

/// Chi-square over transition frequencies against uniform, plus a runs test
/// on the binarized bull/bear sequence; combined p via Bonferroni.
pub fn test_sequence_randomness(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    if records.len() < 3 {
        return Err(StatisticalError::new("sequence_randomness", "fewer than 3 zones"));
    }
    let type_index = |t: ZoneType| -> usize {
        match t {
            ZoneType::Bull => 0,
            ZoneType::Bear => 1,
            ZoneType::Neutral => 2,
        }
    };
    let mut transition_counts = [0usize; 9];
    for pair in records.windows(2) {
        let from = type_index(pair[0].zone_type);
        let to = type_index(pair[1].zone_type);
        transition_counts[from * 3 + to] += 1;
    }
    let (chi_stat, chi_p) = chi_square_uniform_gof(&transition_counts, 9)
        .ok_or_else(|| StatisticalError::new("sequence_randomness", "no transitions observed"))?;

    let binary: Vec<u8> = records
        .iter()
        .filter(|r| r.zone_type != ZoneType::Neutral)
        .map(|r| if r.zone_type == ZoneType::Bull { 1u8 } else { 0u8 })
        .collect();
    let (runs_z, runs_p) = runs_test(&binary)
        .ok_or_else(|| StatisticalError::new("sequence_randomness", "fewer than 2 bull/bear zones for runs test"))?;

    let combined_p = bonferroni(&[chi_p, runs_p]);

    Ok(HypothesisTestResult::new("sequence_randomness", "chi_square + runs_test (bonferroni combined)", chi_stat, combined_p, alpha, records.len())
        .with_meta("chi_square_statistic", chi_stat)
        .with_meta("chi_square_p_value", chi_p)
        .with_meta("runs_z_statistic", runs_z)
        .with_meta("runs_p_value", runs_p))
}

/// Pearson correlations between `volatility_score` and each of
/// `{duration, macd_amplitude, price_return}`, Holm-Bonferroni corrected.
pub fn test_volatility_effects(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let targets = ["duration", "macd_amplitude", "price_return"];
    let mut keys_used = Vec::new();
    let mut raw_stats: Vec<(f64, f64, f64)> = Vec::new();

    for &target in &targets {
        let (vol, other) = pairs(records, VOLATILITY_KEY, target);
        if let Some((r, t, p)) = correlation_test(&vol, &other) {
            keys_used.push(target);
            raw_stats.push((r, t, p));
        }
    }

    if raw_stats.is_empty() {
        return Err(StatisticalError::new("volatility_effects", "no volatility correlation pairs available"));
    }

    let raw_p: Vec<f64> = raw_stats.iter().map(|(_, _, p)| *p).collect();
    let adjusted = holm_bonferroni(&raw_p);

    let (best_idx, _) = adjusted
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .expect("non-empty adjusted p-values");

    let mut result = HypothesisTestResult::new(
        "volatility_effects",
        "pearson_correlation (holm-bonferroni corrected)",
        raw_stats[best_idx].1,
        adjusted[best_idx],
        alpha,
        records.len(),
    )
    .with_effect_size(raw_stats[best_idx].0);

    for (i, key) in keys_used.iter().enumerate() {
        result = result
            .with_meta(format!("{key}_r"), raw_stats[i].0)
            .with_meta(format!("{key}_p_adjusted"), adjusted[i]);
    }
    Ok(result)
}

fn normalized_drawdown(r: &FeatureRecord) -> Option<f64> {
    match r.zone_type {
        ZoneType::Bull => r.features.get_f64("drawdown_from_peak").map(f64::abs),
        ZoneType::Bear => r.features.get_f64("rally_from_trough").map(f64::abs),
        ZoneType::Neutral => None,
    }
}

/// Splits zones by `correlation_price_hist` (>=0.7 vs <=0.3, falling back to
/// top/bottom 20% quantiles only when one fixed group is empty) and runs a
/// t-test on normalized drawdown.
pub fn test_correlation_drawdown(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let rows: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| {
            let corr = r.features.get_f64("correlation_price_hist")?;
            let dd = normalized_drawdown(r)?;
            if corr.is_finite() && dd.is_finite() {
                Some((corr, dd))
            } else {
                None
            }
        })
        .collect();
    if rows.len() < 4 {
        return Err(StatisticalError::new("correlation_drawdown", "fewer than 4 zones with correlation and drawdown"));
    }

    let mut high: Vec<f64> = rows.iter().filter(|(c, _)| *c >= 0.7).map(|(_, d)| *d).collect();
    let mut low: Vec<f64> = rows.iter().filter(|(c, _)| *c <= 0.3).map(|(_, d)| *d).collect();

    if high.is_empty() || low.is_empty() {
        let corrs: Vec<f64> = rows.iter().map(|(c, _)| *c).collect();
        let hi_threshold = quantile(&corrs, 0.8);
        let lo_threshold = quantile(&corrs, 0.2);
        high = rows.iter().filter(|(c, _)| *c >= hi_threshold).map(|(_, d)| *d).collect();
        low = rows.iter().filter(|(c, _)| *c <= lo_threshold).map(|(_, d)| *d).collect();
    }

    let fit = two_sample_t_test(&high, &low)
        .ok_or_else(|| StatisticalError::new("correlation_drawdown", "high/low correlation groups too small"))?;

    Ok(HypothesisTestResult::new("correlation_drawdown", "two_sample_t_test", fit.t_statistic, fit.p_value, alpha, high.len() + low.len())
        .with_effect_size(fit.cohens_d)
        .with_meta("high_n", high.len() as i64)
        .with_meta("low_n", low.len() as i64))
}

/// Augmented Dickey-Fuller on the ordered duration series; significant means stationary.
pub fn test_duration_stationarity(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let durations: Vec<f64> = records.iter().map(|r| r.duration as f64).collect();
    let (tau, p_value) = adf_test(&durations).ok_or_else(|| StatisticalError::new("duration_stationarity", "series too short for ADF"))?;
    let significant = p_value < alpha;
    Ok(HypothesisTestResult::new("duration_stationarity", "augmented_dickey_fuller", tau, p_value, alpha, durations.len()).with_significant(significant))
}

const LEVEL_TOLERANCE_PCT: f64 = 0.005;
const LEVEL_MIN_TOUCHES: usize = 3;

/// Greedily clusters zone start/end prices into levels within
/// `LEVEL_TOLERANCE_PCT` of each other, keeping levels with at least
/// `LEVEL_MIN_TOUCHES` touches.
fn support_resistance_levels(prices: &[f64]) -> Vec<f64> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for price in sorted {
        if let Some(cluster) = clusters.last_mut() {
            let cluster_mean = mean(cluster);
            if (price - cluster_mean).abs() / cluster_mean.max(1e-12) <= LEVEL_TOLERANCE_PCT {
                cluster.push(price);
                continue;
            }
        }
        clusters.push(vec![price]);
    }

    clusters
        .into_iter()
        .filter(|c| c.len() >= LEVEL_MIN_TOUCHES)
        .map(|c| mean(&c))
        .collect()
}

fn near_any_level(price: f64, levels: &[f64]) -> bool {
    levels.iter().any(|&level| (price - level).abs() / level.max(1e-12) <= LEVEL_TOLERANCE_PCT)
}

/// Partitions zones by proximity to a support/resistance level and compares
/// durations; parametric if Shapiro-Wilk-style normality holds, else Mann-Whitney U.
pub fn test_support_resistance_proximity(records: &[FeatureRecord], alpha: f64) -> Result<HypothesisTestResult, StatisticalError> {
    let prices: Vec<f64> = records.iter().flat_map(|r| [r.start_price, r.end_price]).collect();
    let levels = support_resistance_levels(&prices);
    if levels.is_empty() {
        return Err(StatisticalError::new("support_resistance_proximity", "no price level touched at least 3 times"));
    }

    let mut near: Vec<f64> = Vec::new();
    let mut far: Vec<f64> = Vec::new();
    for r in records {
        let touches = near_any_level(r.start_price, &levels) || near_any_level(r.end_price, &levels);
        if touches {
            near.push(r.duration as f64);
        } else {
            far.push(r.duration as f64);
        }
    }
    if near.len() < 2 || far.len() < 2 {
        return Err(StatisticalError::new("support_resistance_proximity", "near/far groups too small"));
    }

    let use_parametric = [&near, &far]
        .iter()
        .all(|group| normality_test(group).map(|(_, p)| p > alpha).unwrap_or(false));

    if use_parametric {
        let fit = two_sample_t_test(&near, &far)
            .ok_or_else(|| StatisticalError::new("support_resistance_proximity", "t-test failed"))?;
        Ok(HypothesisTestResult::new("support_resistance_proximity", "two_sample_t_test", fit.t_statistic, fit.p_value, alpha, near.len() + far.len())
            .with_effect_size(fit.cohens_d)
            .with_meta("n_levels", levels.len() as i64))
    } else {
        let (u, p) = mann_whitney_u(&near, &far)
            .ok_or_else(|| StatisticalError::new("support_resistance_proximity", "mann-whitney u failed"))?;
        Ok(HypothesisTestResult::new("support_resistance_proximity", "mann_whitney_u", u, p, alpha, near.len() + far.len())
            .with_meta("n_levels", levels.len() as i64))
    }
}

type TestFn = fn(&[FeatureRecord], f64) -> Result<HypothesisTestResult, StatisticalError>;

const ALL_TESTS: &[(&str, TestFn)] = &[
    ("duration_vs_return", test_duration_vs_return),
    ("slope_duration_correlation", test_slope_duration_correlation),
    ("bull_bear_asymmetry", test_bull_bear_asymmetry),
    ("sequence_randomness", test_sequence_randomness),
    ("volatility_effects", test_volatility_effects),
    ("correlation_drawdown", test_correlation_drawdown),
    ("duration_stationarity", test_duration_stationarity),
    ("support_resistance_proximity", test_support_resistance_proximity),
];

/// Runs every test, capturing a `StatisticalError` into a
/// `significant=false` placeholder slot rather than aborting the batch (§7).
pub fn run_all(records: &[FeatureRecord], alpha: f64) -> TestSuiteResults {
    let mut tests = BTreeMap::new();
    let mut significant_count = 0i64;

    for &(name, test_fn) in ALL_TESTS {
        let result = match test_fn(records, alpha) {
            Ok(result) => result,
            Err(err) => HypothesisTestResult::new(name, "error", 0.0, 1.0, alpha, records.len())
                .with_significant(false)
                .with_meta("error", err.reason),
        };
        if result.significant {
            significant_count += 1;
        }
        tests.insert(name.to_string(), result);
    }

    let mut summary = BTreeMap::new();
    summary.insert("tests_run".to_string(), Scalar::from(tests.len() as i64));
    summary.insert("significant_count".to_string(), Scalar::from(significant_count));
    summary.insert("sample_size".to_string(), Scalar::from(records.len() as i64));

    TestSuiteResults { tests, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bquant_core::types::{FeatureMap, IndicatorContext};
    use chrono::Utc;

    fn record(duration: usize, price_return: f64) -> FeatureMap {
        let mut features = FeatureMap::new();
        features.insert("duration", duration as i64);
        features.insert("price_return", price_return);
        features
    }

    fn synthetic_records(n: usize, bull_return: f64, bear_return: f64) -> Vec<FeatureRecord> {
        (0..n)
            .map(|i| {
                let zone_type = if i % 2 == 0 { ZoneType::Bull } else { ZoneType::Bear };
                let price_return = if zone_type == ZoneType::Bull { bull_return } else { bear_return };
                let features = record(10 + i, price_return);
                FeatureRecord {
                    zone_id: i,
                    zone_type,
                    duration: 10 + i,
                    price_return,
                    start_price: 100.0,
                    end_price: 100.0 * (1.0 + price_return),
                    features,
                }
            })
            .collect()
    }

    #[test]
    fn duration_vs_return_detects_no_effect_on_identical_groups() {
        let records = synthetic_records(30, 0.01, 0.01);
        let result = test_duration_vs_return(&records, 0.05);
        assert!(result.is_ok());
    }

    #[test]
    fn bull_bear_asymmetry_detects_strong_mean_shift() {
        let records = synthetic_records(50, 0.02, -0.01);
        let result = test_bull_bear_asymmetry(&records, 0.05).unwrap();
        assert!(result.significant);
        assert!(result.effect_size.unwrap() > 0.0);
    }

    #[test]
    fn too_few_records_is_statistical_error() {
        let records = synthetic_records(3, 0.02, -0.01);
        assert!(test_duration_vs_return(&records, 0.05).is_err());
    }

    #[test]
    fn run_all_captures_failures_without_panicking() {
        let records = synthetic_records(50, 0.02, -0.01);
        let suite = run_all(&records, 0.05);
        assert_eq!(suite.tests.len(), ALL_TESTS.len());
        for (_, result) in &suite.tests {
            let _ = Utc::now().signed_duration_since(result.generated_at);
        }
    }
}
