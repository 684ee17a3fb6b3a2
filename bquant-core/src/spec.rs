//! Serializable pipeline configuration and its content fingerprint.
//!
//! Mirrors the run-configuration pattern of hashing a canonical JSON
//! serialization with BLAKE3: two `PipelineSpec`s with identical fields
//! produce identical fingerprints regardless of field insertion order in
//! code, which is what the optional result cache (§5) would key on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Scalar;

/// Where an indicator implementation is resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorSource {
    Custom,
    Library,
    Preloaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub source: IndicatorSource,
    pub name: String,
    pub params: BTreeMap<String, Scalar>,
}

impl IndicatorSpec {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            source: IndicatorSource::Custom,
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).and_then(Scalar::as_f64).unwrap_or(default)
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(Scalar::as_f64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }
}

/// Which zone types a `zero_crossing` run should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTypeFilter {
    Bull,
    Bear,
    Neutral,
}

/// Selects one of the three detection strategies (§4.2), tagged for
/// straightforward `serde` round-tripping of a saved pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DetectionSpec {
    ZeroCrossing {
        indicator_col: String,
        min_duration: Option<usize>,
        zone_types: Vec<ZoneTypeFilter>,
    },
    Threshold {
        indicator_col: String,
        upper_threshold: f64,
        lower_threshold: f64,
        require_cross: bool,
    },
    LineCrossing {
        line1_col: String,
        line2_col: String,
        min_duration: Option<usize>,
    },
}

/// Swing algorithm family (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingAlgorithm {
    FindPeaks,
    PivotPoints,
    ZigZag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingScope {
    PerZone,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingSpec {
    pub algorithm: SwingAlgorithm,
    pub scope: SwingScope,
    pub auto_thresholds: bool,
    /// Fixed parameters used when `auto_thresholds` is false, or as the base
    /// magnitude before ATR-scaling when it is true.
    pub deviation_pct: f64,
    pub min_amplitude_pct: f64,
    pub min_legs: usize,
}

impl Default for SwingSpec {
    fn default() -> Self {
        Self {
            algorithm: SwingAlgorithm::ZigZag,
            scope: SwingScope::Global,
            auto_thresholds: false,
            deviation_pct: 0.03,
            min_amplitude_pct: 0.01,
            min_legs: 1,
        }
    }
}

/// Which C3 feature strategies to run; at most one instance per family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStrategySelection {
    pub swing: Option<SwingSpec>,
    pub shape: bool,
    pub divergence: bool,
    pub volume: bool,
    pub volatility: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSpec {
    pub enabled: bool,
    pub n_clusters: usize,
}

impl Default for ClusteringSpec {
    fn default() -> Self {
        Self { enabled: false, n_clusters: 3 }
    }
}

/// The full, serializable configuration of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub indicator: Option<IndicatorSpec>,
    pub detection: DetectionSpec,
    pub strategies: FeatureStrategySelection,
    pub clustering: ClusteringSpec,
    pub seed: u64,
}

impl PipelineSpec {
    /// A deterministic content hash of this configuration (not of the input
    /// frame). Combined with a hash of the frame's contents, this is a
    /// building block for the optional result cache described in §5.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("PipelineSpec must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> PipelineSpec {
        PipelineSpec {
            indicator: Some(IndicatorSpec::custom("macd").with_param("fast", 12i64)),
            detection: DetectionSpec::ZeroCrossing {
                indicator_col: "macd_hist".into(),
                min_duration: None,
                zone_types: vec![],
            },
            strategies: FeatureStrategySelection {
                swing: Some(SwingSpec::default()),
                shape: true,
                divergence: false,
                volume: false,
                volatility: true,
            },
            clustering: ClusteringSpec::default(),
            seed: 42,
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let spec = sample_spec();
        assert_eq!(spec.fingerprint(), spec.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_params() {
        let a = sample_spec();
        let mut b = sample_spec();
        b.seed = 43;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn spec_roundtrips_through_json() {
        let spec = sample_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let back: PipelineSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
