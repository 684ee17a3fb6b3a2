//! Shared result types for the statistics, regression, and validation
//! surfaces (§4.8). Each carries a timestamp and a small metadata bag, and
//! serializes the way `bquant_core::types::AnalysisResult` does.

use std::collections::BTreeMap;

use bquant_core::types::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisTestResult {
    pub hypothesis: String,
    pub test_type: String,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub alpha: f64,
    pub effect_size: Option<f64>,
    pub confidence_interval: Option<(f64, f64)>,
    pub sample_size: usize,
    pub metadata: BTreeMap<String, Scalar>,
    pub generated_at: DateTime<Utc>,
}

impl HypothesisTestResult {
    pub fn new(
        hypothesis: impl Into<String>,
        test_type: impl Into<String>,
        statistic: f64,
        p_value: f64,
        alpha: f64,
        sample_size: usize,
    ) -> Self {
        Self {
            hypothesis: hypothesis.into(),
            test_type: test_type.into(),
            statistic,
            p_value,
            significant: p_value < alpha,
            alpha,
            effect_size: None,
            confidence_interval: None,
            sample_size,
            metadata: BTreeMap::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn with_effect_size(mut self, effect_size: f64) -> Self {
        self.effect_size = Some(effect_size);
        self
    }

    pub fn with_confidence_interval(mut self, ci: (f64, f64)) -> Self {
        self.confidence_interval = Some(ci);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Overrides the default `p_value < alpha` significance reading, used by
    /// stationarity-style tests where significance means "stationary".
    pub fn with_significant(mut self, significant: bool) -> Self {
        self.significant = significant;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionResult {
    pub target: String,
    pub predictors: Vec<String>,
    pub coefficients: BTreeMap<String, f64>,
    pub p_values: BTreeMap<String, f64>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub predictions: Vec<f64>,
    pub residuals: Vec<f64>,
    pub n_observations: usize,
    pub n_predictors: usize,
    pub summary: String,
    pub f_statistic: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    pub durbin_watson: Option<f64>,
    pub variance_inflation_factors: BTreeMap<String, f64>,
    pub generated_at: DateTime<Utc>,
}

impl RegressionResult {
    pub fn get_significant_predictors(&self, alpha: f64) -> Vec<String> {
        self.predictors
            .iter()
            .filter(|p| self.p_values.get(*p).map(|&pv| pv < alpha).unwrap_or(false))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub protocol: String,
    pub success: bool,
    pub metrics: BTreeMap<String, f64>,
    pub metadata: BTreeMap<String, Scalar>,
    pub generated_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn new(protocol: impl Into<String>, success: bool) -> Self {
        Self {
            protocol: protocol.into(),
            success,
            metrics: BTreeMap::new(),
            metadata: BTreeMap::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A `run_all`-style bundle keyed by stable short test names (§5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestSuiteResults {
    pub tests: BTreeMap<String, HypothesisTestResult>,
    pub summary: BTreeMap<String, Scalar>,
}
