//! Convenience re-exports of the types most callers reach for.

pub use crate::detection::detect_zones;
pub use crate::error::{BquantError, DetectionError, FeatureError, IndicatorError, InputError};
pub use crate::frame::MarketFrame;
pub use crate::pipeline::ZoneAnalyzerBuilder;
pub use crate::rng::SeedHierarchy;
pub use crate::spec::{
    ClusteringSpec, DetectionSpec, FeatureStrategySelection, IndicatorSource, IndicatorSpec,
    PipelineSpec, SwingAlgorithm, SwingScope, SwingSpec,
};
pub use crate::types::{
    AnalysisResult, Bar, FeatureMap, FeatureRecord, IndicatorContext, Scalar, Statistics, Zone,
    ZoneType,
};
