//! # bquant-analysis
//!
//! Statistical, regression, and robustness-validation layer that consumes
//! an `AnalysisResult` (and its `FeatureRecord` rows) from `bquant-core`.
//!
//! ## Components
//!
//! - `stats`: eight named hypothesis tests over zone feature records plus a
//!   `run_all` bundle
//! - `regression`: OLS models for zone duration and price return
//! - `validation`: out-of-sample, walk-forward, sensitivity, and Monte Carlo
//!   robustness checks, generic over a caller-supplied analyzer
//! - `result`: shared result types (`HypothesisTestResult`, `RegressionResult`,
//!   `ValidationResult`, `TestSuiteResults`)
//! - `error`: typed errors for each module, plus the `AnalysisError` umbrella

pub mod error;
pub mod prelude;
pub mod regression;
pub mod result;
pub mod stats;
pub mod stats_math;
pub mod validation;

pub use error::AnalysisError;
pub use regression::{fit_duration_regression, fit_return_regression};
pub use result::{HypothesisTestResult, RegressionResult, TestSuiteResults, ValidationResult};
pub use stats::run_all;
pub use validation::{monte_carlo, out_of_sample, sensitivity, walk_forward, Analyzer, ShuffleMethod};
