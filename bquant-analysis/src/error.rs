//! Typed errors for the statistics, regression, and validation surfaces (§7).
//!
//! `FeatureError` already lives in `bquant-core` and is recorded per-zone
//! without aborting the pipeline. The error kinds here are pipeline-fatal for
//! their own entry point: a failing hypothesis test, regression fit, or
//! validation protocol surfaces to the caller rather than being silently
//! patched over.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("statistical test `{test}` failed: {reason}")]
pub struct StatisticalError {
    pub test: String,
    pub reason: String,
}

impl StatisticalError {
    pub fn new(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { test: test.into(), reason: reason.into() }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("regression `{model}` failed: {reason}")]
pub struct RegressionError {
    pub model: String,
    pub reason: String,
}

impl RegressionError {
    pub fn new(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { model: model.into(), reason: reason.into() }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("validation `{protocol}` failed: {reason}")]
pub struct ValidationError {
    pub protocol: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(protocol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { protocol: protocol.into(), reason: reason.into() }
    }
}

/// Umbrella error for the crate's three surfaces, analogous to
/// `bquant_core::error::BquantError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Statistical(#[from] StatisticalError),
    #[error(transparent)]
    Regression(#[from] RegressionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
