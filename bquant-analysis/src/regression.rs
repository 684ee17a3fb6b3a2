//! Regression Analyzer (C6): ordinary least squares over zone feature
//! records.
//!
//! Two default models are provided, one for zone duration and one for
//! price return, each regressed against a fixed predictor list drawn
//! from the feature columns that the detection and feature-strategy
//! layers populate. A predictor absent from every record is dropped
//! before fitting rather than treated as an error, since not every
//! pipeline configuration runs every feature strategy.

use std::collections::BTreeMap;

use bquant_core::mathutil::mean;
use bquant_core::types::FeatureRecord;

use crate::error::RegressionError;
use crate::result::RegressionResult;
use crate::stats_math::t_two_sided_p;

/// Default predictor set for the duration model.
pub const DURATION_PREDICTORS: &[&str] = &[
    "macd_amplitude",
    "hist_amplitude",
    "correlation_price_hist",
    "price_range_pct",
    "num_peaks",
    "num_troughs",
];

/// Default predictor set for the price-return model.
pub const RETURN_PREDICTORS: &[&str] = &[
    "duration",
    "macd_amplitude",
    "correlation_price_hist",
    "drawdown_from_peak",
    "hist_slope",
    "num_peaks",
];

/// Fit `duration ~ f(predictors)` over the given records.
pub fn fit_duration_regression(
    records: &[FeatureRecord],
    predictors: &[&str],
) -> Result<RegressionResult, RegressionError> {
    fit_ols(records, "duration", |r| Some(r.duration as f64), predictors)
}

/// Fit `price_return ~ f(predictors)` over the given records.
pub fn fit_return_regression(
    records: &[FeatureRecord],
    predictors: &[&str],
) -> Result<RegressionResult, RegressionError> {
    fit_ols(records, "price_return", |r| Some(r.price_return), predictors)
}

fn fit_ols(
    records: &[FeatureRecord],
    target_name: &str,
    target_fn: impl Fn(&FeatureRecord) -> Option<f64>,
    predictors: &[&str],
) -> Result<RegressionResult, RegressionError> {
    let model = format!("{target_name} ~ {predictors:?}");

    let available: Vec<&str> = predictors
        .iter()
        .copied()
        .filter(|name| records.iter().any(|r| r.get_f64(name).is_some_and(f64::is_finite)))
        .collect();
    let dropped: Vec<&str> = predictors
        .iter()
        .copied()
        .filter(|name| !available.contains(name))
        .collect();

    if available.is_empty() {
        return Err(RegressionError {
            model,
            reason: "none of the requested predictors are present in any record".into(),
        });
    }

    let mut targets = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for record in records {
        let Some(y) = target_fn(record).filter(|v| v.is_finite()) else {
            continue;
        };
        let mut row = Vec::with_capacity(available.len());
        let mut complete = true;
        for name in &available {
            match record.get_f64(name).filter(|v| v.is_finite()) {
                Some(v) => row.push(v),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            targets.push(y);
            rows.push(row);
        }
    }

    let n = rows.len();
    let p = available.len();
    if n < p + 2 {
        return Err(RegressionError {
            model,
            reason: format!(
                "only {n} complete-case observations available, need at least {}",
                p + 2
            ),
        });
    }

    // Design matrix with an intercept column.
    let design: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            let mut r = Vec::with_capacity(p + 1);
            r.push(1.0);
            r.extend_from_slice(row);
            r
        })
        .collect();

    let xtx = gram(&design);
    let xty = cross(&design, &targets);
    let xtx_inv = invert(&xtx).ok_or_else(|| RegressionError {
        model: model.clone(),
        reason: "design matrix is singular (collinear predictors)".into(),
    })?;
    let beta = mat_vec(&xtx_inv, &xty);

    let predictions: Vec<f64> = design.iter().map(|row| dot(row, &beta)).collect();
    let residuals: Vec<f64> = targets
        .iter()
        .zip(&predictions)
        .map(|(y, yhat)| y - yhat)
        .collect();

    let rss: f64 = residuals.iter().map(|e| e * e).sum();
    let y_mean = mean(&targets);
    let tss: f64 = targets.iter().map(|y| (y - y_mean).powi(2)).sum();
    let r_squared = if tss > 1e-12 { 1.0 - rss / tss } else { 1.0 };
    let df_resid = (n - p - 1) as f64;
    let adjusted_r_squared = if df_resid > 0.0 {
        1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid
    } else {
        r_squared
    };

    let sigma2 = if df_resid > 0.0 { rss / df_resid } else { 0.0 };
    let se: Vec<f64> = (0..=p).map(|j| (sigma2 * xtx_inv[j][j]).max(0.0).sqrt()).collect();
    let p_values: Vec<f64> = beta
        .iter()
        .zip(&se)
        .map(|(b, s)| {
            if *s > 1e-12 {
                t_two_sided_p(b / s, df_resid)
            } else {
                1.0
            }
        })
        .collect();

    let f_statistic = if p > 0 && rss > 1e-12 && df_resid > 0.0 {
        Some(((tss - rss) / p as f64) / (rss / df_resid))
    } else {
        None
    };

    let (aic, bic) = if rss > 1e-12 {
        let ln_rss_over_n = (rss / n as f64).ln();
        let k = (p + 1) as f64;
        (
            Some(n as f64 * ln_rss_over_n + 2.0 * k),
            Some(n as f64 * ln_rss_over_n + k * (n as f64).ln()),
        )
    } else {
        (None, None)
    };

    let durbin_watson = if residuals.len() >= 2 {
        let num: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        if rss > 1e-12 { Some(num / rss) } else { None }
    } else {
        None
    };

    let variance_inflation_factors = if p >= 2 {
        let mut vifs = BTreeMap::new();
        for (j, name) in available.iter().enumerate() {
            let other_targets: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let other_predictors: Vec<Vec<f64>> = rows
                .iter()
                .map(|r| {
                    r.iter()
                        .enumerate()
                        .filter(|(k, _)| *k != j)
                        .map(|(_, v)| *v)
                        .collect()
                })
                .collect();
            let vif = auxiliary_r_squared(&other_predictors, &other_targets)
                .map(|r2| if r2 < 1.0 - 1e-9 { 1.0 / (1.0 - r2) } else { f64::INFINITY });
            if let Some(v) = vif {
                vifs.insert((*name).to_string(), v);
            }
        }
        vifs
    } else {
        BTreeMap::new()
    };

    let mut coefficients = BTreeMap::new();
    coefficients.insert("intercept".to_string(), beta[0]);
    let mut p_value_map = BTreeMap::new();
    p_value_map.insert("intercept".to_string(), p_values[0]);
    for (j, name) in available.iter().enumerate() {
        coefficients.insert((*name).to_string(), beta[j + 1]);
        p_value_map.insert((*name).to_string(), p_values[j + 1]);
    }

    let mut summary = format!(
        "OLS: {target_name} ~ {:?}, n={n}, R²={r_squared:.4}, adj R²={adjusted_r_squared:.4}",
        available
    );
    if !dropped.is_empty() {
        summary.push_str(&format!(", dropped predictors (absent from data): {dropped:?}"));
    }

    Ok(RegressionResult {
        target: target_name.to_string(),
        predictors: available.iter().map(|s| s.to_string()).collect(),
        coefficients,
        p_values: p_value_map,
        r_squared,
        adjusted_r_squared,
        predictions,
        residuals,
        n_observations: n,
        n_predictors: p,
        summary,
        f_statistic,
        aic,
        bic,
        durbin_watson,
        variance_inflation_factors,
        generated_at: chrono::Utc::now(),
    })
}

/// R² of regressing `target` on `predictors` (with intercept), used for VIF.
fn auxiliary_r_squared(predictors: &[Vec<f64>], target: &[f64]) -> Option<f64> {
    let n = predictors.len();
    let p = predictors.first()?.len();
    if p == 0 || n < p + 2 {
        return None;
    }
    let design: Vec<Vec<f64>> = predictors
        .iter()
        .map(|row| {
            let mut r = Vec::with_capacity(p + 1);
            r.push(1.0);
            r.extend_from_slice(row);
            r
        })
        .collect();
    let xtx = gram(&design);
    let xty = cross(&design, target);
    let xtx_inv = invert(&xtx)?;
    let beta = mat_vec(&xtx_inv, &xty);
    let predictions: Vec<f64> = design.iter().map(|row| dot(row, &beta)).collect();
    let y_mean = mean(target);
    let tss: f64 = target.iter().map(|y| (y - y_mean).powi(2)).sum();
    if tss <= 1e-12 {
        return Some(0.0);
    }
    let rss: f64 = target.iter().zip(&predictions).map(|(y, yh)| (y - yh).powi(2)).sum();
    Some((1.0 - rss / tss).clamp(0.0, 1.0))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// X^T X
fn gram(design: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = design[0].len();
    let mut out = vec![vec![0.0; k]; k];
    for row in design {
        for i in 0..k {
            for j in 0..k {
                out[i][j] += row[i] * row[j];
            }
        }
    }
    out
}

/// X^T y
fn cross(design: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let k = design[0].len();
    let mut out = vec![0.0; k];
    for (row, yi) in design.iter().zip(y) {
        for i in 0..k {
            out[i] += row[i] * yi;
        }
    }
    out
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

/// Gauss-Jordan matrix inversion with partial pivoting. Returns `None` if
/// the matrix is singular to within numerical tolerance.
fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))?;
        if aug[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor != 0.0 {
                for c in 0..2 * n {
                    aug[row][c] -= factor * aug[col][c];
                }
            }
        }
    }

    Some(aug.iter().map(|row| row[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bquant_core::types::{FeatureMap, Scalar, ZoneType};

    fn record(duration: usize, price_return: f64, feats: &[(&str, f64)]) -> FeatureRecord {
        let mut features = FeatureMap::new();
        for (k, v) in feats {
            features.insert(k.to_string(), Scalar::Float(*v));
        }
        FeatureRecord {
            zone_id: 0,
            zone_type: ZoneType::Bull,
            duration,
            price_return,
            start_price: 100.0,
            end_price: 100.0,
            features,
        }
    }

    #[test]
    fn fits_simple_linear_relationship() {
        // duration = 2 * macd_amplitude + 3, noiseless.
        let records: Vec<FeatureRecord> = (1..=12)
            .map(|i| {
                let amp = i as f64;
                record((2 * i as usize + 3), 0.0, &[("macd_amplitude", amp)])
            })
            .collect();
        let result = fit_duration_regression(&records, &["macd_amplitude"]).unwrap();
        assert_eq!(result.n_predictors, 1);
        assert!(result.r_squared > 0.999);
        assert!((result.coefficients["macd_amplitude"] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn drops_predictors_absent_from_every_record() {
        let records: Vec<FeatureRecord> = (1..=12)
            .map(|i| record(i as usize, 0.0, &[("macd_amplitude", i as f64)]))
            .collect();
        let result = fit_duration_regression(&records, DURATION_PREDICTORS).unwrap();
        assert_eq!(result.predictors, vec!["macd_amplitude".to_string()]);
        assert!(result.summary.contains("dropped predictors"));
    }

    #[test]
    fn too_few_observations_is_an_error() {
        let records: Vec<FeatureRecord> = (1..=3)
            .map(|i| record(i as usize, 0.0, &[("macd_amplitude", i as f64)]))
            .collect();
        let err = fit_duration_regression(&records, &["macd_amplitude"]).unwrap_err();
        assert!(err.reason.contains("complete-case"));
    }

    #[test]
    fn residuals_reconstruct_target() {
        let records: Vec<FeatureRecord> = (1..=15)
            .map(|i| {
                let amp = i as f64;
                record(0, amp * 1.5 + 0.3 * ((i % 3) as f64), &[("macd_amplitude", amp)])
            })
            .collect();
        let result = fit_return_regression(&records, &["macd_amplitude"]).unwrap();
        let residual_sum: f64 = result.residuals.iter().sum();
        assert!(residual_sum.abs() < 1e-6);
        for (i, record) in records.iter().enumerate() {
            let reconstructed = result.predictions[i] + result.residuals[i];
            assert!((reconstructed - record.price_return).abs() < 1e-9);
        }
    }
}
