//! Convenience re-exports of the types most callers reach for.

pub use crate::error::{AnalysisError, RegressionError, StatisticalError, ValidationError};
pub use crate::regression::{fit_duration_regression, fit_return_regression};
pub use crate::result::{HypothesisTestResult, RegressionResult, TestSuiteResults, ValidationResult};
pub use crate::stats::run_all;
pub use crate::validation::{monte_carlo, out_of_sample, sensitivity, walk_forward, Analyzer, FnAnalyzer, ParamAnalyzer, ShuffleMethod};
