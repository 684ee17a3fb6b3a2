//! bquant-core — shared domain types, OHLCV frame, indicator registry, zone
//! detection, feature strategies, and the universal zone-analysis pipeline.
//!
//! This crate owns everything up through a finished `AnalysisResult`: reading
//! bars, computing indicators, segmenting zones, and attaching per-zone
//! features. The statistics, regression, and validation suites that consume
//! an `AnalysisResult` live downstream in `bquant-analysis`.

pub mod clustering;
pub mod detection;
pub mod error;
pub mod features;
pub mod frame;
pub mod indicators;
pub mod mathutil;
pub mod pipeline;
pub mod prelude;
pub mod rng;
pub mod spec;
pub mod types;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the shared value types are Send + Sync, required
    /// for the embarrassingly-parallel feature/Monte Carlo loops in
    /// `bquant-analysis` (§5).
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<types::Bar>();
        require_sync::<types::Bar>();
        require_send::<types::Zone>();
        require_sync::<types::Zone>();
        require_send::<types::FeatureMap>();
        require_sync::<types::FeatureMap>();
        require_send::<types::IndicatorContext>();
        require_sync::<types::IndicatorContext>();
        require_send::<types::AnalysisResult>();
        require_sync::<types::AnalysisResult>();
        require_send::<frame::MarketFrame>();
        require_sync::<frame::MarketFrame>();
        require_send::<spec::PipelineSpec>();
        require_sync::<spec::PipelineSpec>();
    }
}
