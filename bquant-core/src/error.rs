//! Typed error taxonomy for the indicator/detection/feature/pipeline surfaces.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("frame has no rows")]
    EmptyFrame,
    #[error("missing required column `{0}`")]
    MissingColumn(String),
    #[error("time index is not strictly increasing at row {0}")]
    NonMonotonicIndex(usize),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("indicator `{name}` failed: {reason}")]
pub struct IndicatorError {
    pub name: String,
    pub reason: String,
}

impl IndicatorError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("zone detection failed: {reason}")]
pub struct DetectionError {
    pub reason: String,
}

impl DetectionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Captured per-strategy, per-zone. Never aborts the pipeline; recorded under
/// `zone.features.metadata.errors.<strategy>`.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("feature strategy `{strategy}` failed on zone {zone_id}: {reason}")]
pub struct FeatureError {
    pub strategy: String,
    pub zone_id: usize,
    pub reason: String,
}

impl FeatureError {
    pub fn new(strategy: impl Into<String>, zone_id: usize, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            zone_id,
            reason: reason.into(),
        }
    }
}

/// Umbrella error returned by the pipeline builder's `build()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BquantError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}
