//! Shared value types: bars, frames, zones, contexts, and the flat feature map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single OHLCV bar. `volume` is optional; a `NaN` volume means "not supplied".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn has_volume(&self) -> bool {
        !self.volume.is_nan()
    }
}

/// A scalar value in a feature map. Numeric, boolean, or short string.
///
/// Modeled as a tagged union rather than `f64` alone because feature strategies
/// emit categorical outputs (`volume_trend`, `divergence_type`) alongside numeric ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// An insertion-order-preserving `string -> Scalar` map.
///
/// A `HashMap` would satisfy every read in this crate but not the ordering
/// invariant (§5: "feature keys within a zone are stable by insertion"), and a
/// `BTreeMap` would silently re-sort keys alphabetically. This keeps first-write
/// order without pulling in an external ordered-map crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap {
    entries: Vec<(String, Scalar)>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`. Overwriting an existing key keeps its
    /// original position rather than moving it to the end.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Scalar::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` into `self`, preserving `self`'s existing key order and
    /// appending any keys unique to `other` in `other`'s order.
    pub fn merge(&mut self, other: FeatureMap) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }
}

impl Serialize for FeatureMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // `serde_json`'s "preserve_order" feature backs `Map` with an `IndexMap`,
        // so the entries below come back in the order they appeared on the wire —
        // required for the round-trip invariant on `features` (§8.2).
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut entries = Vec::with_capacity(map.len());
        for (k, v) in map {
            let scalar: Scalar = serde_json::from_value(v).map_err(serde::de::Error::custom)?;
            entries.push((k, scalar));
        }
        Ok(FeatureMap { entries })
    }
}

/// The type assigned to a zone by a detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Bull,
    Bear,
    Neutral,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneType::Bull => "bull",
            ZoneType::Bear => "bear",
            ZoneType::Neutral => "neutral",
        }
    }
}

/// The envelope carried by every zone naming which column(s) drove detection.
///
/// Feature strategies read `detection_indicator` / `signal_line` from here
/// rather than hard-coding indicator names, so a fictional indicator column
/// produces the same headline feature keys as a built-in one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorContext {
    pub detection_indicator: String,
    pub detection_strategy: String,
    pub signal_line: Option<String>,
    pub bounded: Option<bool>,
    pub extra_params: BTreeMap<String, Scalar>,
}

impl IndicatorContext {
    pub fn new(detection_indicator: impl Into<String>, detection_strategy: impl Into<String>) -> Self {
        Self {
            detection_indicator: detection_indicator.into(),
            detection_strategy: detection_strategy.into(),
            signal_line: None,
            bounded: None,
            extra_params: BTreeMap::new(),
        }
    }

    pub fn with_signal_line(mut self, signal_line: impl Into<String>) -> Self {
        self.signal_line = Some(signal_line.into());
        self
    }

    pub fn with_bounded(mut self, bounded: bool) -> Self {
        self.bounded = Some(bounded);
        self
    }
}

/// A local extremum on the close series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingType {
    Peak,
    Trough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub swing_type: SwingType,
    pub point_id: usize,
    pub amplitude_to_next: Option<f64>,
}

/// A half-open interval `[start_idx, end_idx)` over the input frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: usize,
    pub zone_type: ZoneType,
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_price: f64,
    pub end_price: f64,
    pub duration: usize,
    pub indicator_context: IndicatorContext,
    pub swing_context: Option<Vec<SwingPoint>>,
    pub features: FeatureMap,
    pub cluster_id: Option<usize>,
}

impl Zone {
    pub fn price_return(&self) -> f64 {
        (self.end_price - self.start_price) / self.start_price
    }
}

/// The flat projection of a zone's features merged with identity fields —
/// the canonical row shape consumed by the statistical/regression/validation
/// suites in `bquant-analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub zone_id: usize,
    pub zone_type: ZoneType,
    pub duration: usize,
    pub price_return: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub features: FeatureMap,
}

impl FeatureRecord {
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match key {
            "duration" => Some(self.duration as f64),
            "price_return" => Some(self.price_return),
            "start_price" => Some(self.start_price),
            "end_price" => Some(self.end_price),
            other => self.features.get_f64(other),
        }
    }
}

impl From<&Zone> for FeatureRecord {
    fn from(zone: &Zone) -> Self {
        FeatureRecord {
            zone_id: zone.zone_id,
            zone_type: zone.zone_type,
            duration: zone.duration,
            price_return: zone.price_return(),
            start_price: zone.start_price,
            end_price: zone.end_price,
            features: zone.features.clone(),
        }
    }
}

/// Duration distribution quantiles, computed overall and per zone type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationDistribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub min: f64,
    pub max: f64,
}

/// Aggregate statistics computed by the pipeline over the full zone sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub count_by_type: BTreeMap<String, usize>,
    pub duration_overall: DurationDistribution,
    pub duration_by_type: BTreeMap<String, DurationDistribution>,
    pub avg_features_by_type: BTreeMap<String, FeatureMap>,
    /// Row `i`, column `j` is the count of transitions from zone type `i` to `j`,
    /// in the fixed order `[bull, bear, neutral]`.
    pub transition_matrix: [[usize; 3]; 3],
    pub cluster_summary: Option<ClusterSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub k: usize,
    pub sizes: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
}

/// The final output of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub zones: Vec<Zone>,
    pub statistics: Statistics,
    pub indicator_context: IndicatorContext,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn feature_records(&self) -> Vec<FeatureRecord> {
        self.zones.iter().map(FeatureRecord::from).collect()
    }
}

pub fn zone_type_index(t: ZoneType) -> usize {
    match t {
        ZoneType::Bull => 0,
        ZoneType::Bear => 1,
        ZoneType::Neutral => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_map_preserves_insertion_order() {
        let mut fm = FeatureMap::new();
        fm.insert("z", 1.0);
        fm.insert("a", 2.0);
        fm.insert("m", 3.0);
        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn feature_map_overwrite_keeps_position() {
        let mut fm = FeatureMap::new();
        fm.insert("a", 1.0);
        fm.insert("b", 2.0);
        fm.insert("a", 99.0);
        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fm.get_f64("a"), Some(99.0));
    }

    #[test]
    fn feature_map_merge_appends_new_keys_only() {
        let mut a = FeatureMap::new();
        a.insert("x", 1.0);
        let mut b = FeatureMap::new();
        b.insert("y", 2.0);
        b.insert("x", 5.0);
        a.merge(b);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(a.get_f64("x"), Some(5.0));
    }

    #[test]
    fn scalar_conversions() {
        assert_eq!(Scalar::from(3.5).as_f64(), Some(3.5));
        assert_eq!(Scalar::from(true).as_f64(), Some(1.0));
        assert_eq!(Scalar::from("hi").as_str(), Some("hi"));
        assert_eq!(Scalar::from(4i64).as_f64(), Some(4.0));
    }

    #[test]
    fn zone_price_return() {
        let ctx = IndicatorContext::new("FICT", "zero_crossing");
        let now = Utc::now();
        let z = Zone {
            zone_id: 0,
            zone_type: ZoneType::Bull,
            start_idx: 0,
            end_idx: 10,
            start_time: now,
            end_time: now,
            start_price: 100.0,
            end_price: 110.0,
            duration: 10,
            indicator_context: ctx,
            swing_context: None,
            features: FeatureMap::new(),
            cluster_id: None,
        };
        assert!((z.price_return() - 0.10).abs() < 1e-12);
    }
}
