//! Universal Zone Analyzer (C4): the fluent pipeline builder that orchestrates
//! C1 (indicators) -> C2 (detection) -> C3 (feature strategies) and assembles
//! the `AnalysisResult` (§4.4).
//!
//! `build()` runs the eight steps of §4.4 in order: copy the input frame,
//! append indicator columns, detect zones, compute the global pivot series
//! when `swing_scope=global`, apply every selected feature strategy to every
//! zone, compute the universal predicates, optionally cluster, then assemble
//! `Statistics` and the final `AnalysisResult`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rayon::prelude::*;

use crate::clustering::kmeans;
use crate::detection::detect_zones;
use crate::error::{BquantError, DetectionError};
use crate::features::{apply_all, swing, FeatureStrategySet};
use crate::frame::MarketFrame;
use crate::indicators::atr::Atr;
use crate::indicators::{Indicator, IndicatorRegistry};
use crate::mathutil::{mean, median, pearson_correlation, quantile};
use crate::rng::SeedHierarchy;
use crate::spec::{
    ClusteringSpec, DetectionSpec, FeatureStrategySelection, IndicatorSpec, PipelineSpec,
    SwingAlgorithm, SwingScope, SwingSpec,
};
use crate::types::{
    AnalysisResult, ClusterSummary, DurationDistribution, FeatureMap, IndicatorContext,
    Statistics, Zone, ZoneType, zone_type_index,
};

/// Named swing parameter presets recognized by `with_swing_preset` (§6.2).
/// Unknown names leave the current swing configuration untouched.
pub fn swing_preset(name: &str) -> Option<SwingSpec> {
    match name {
        "scalp" => Some(SwingSpec {
            algorithm: SwingAlgorithm::ZigZag,
            scope: SwingScope::Global,
            auto_thresholds: false,
            deviation_pct: 0.01,
            min_amplitude_pct: 0.005,
            min_legs: 1,
        }),
        "swing" => Some(SwingSpec::default()),
        "position" => Some(SwingSpec {
            algorithm: SwingAlgorithm::ZigZag,
            scope: SwingScope::Global,
            auto_thresholds: true,
            deviation_pct: 0.05,
            min_amplitude_pct: 0.02,
            min_legs: 3,
        }),
        _ => None,
    }
}

/// Fluent builder over the universal zone-analysis pipeline (§6.2).
///
/// Every `with_*` method consumes and returns `Self` so calls chain; `build`
/// borrows `&self` so the same configured builder can run against the same
/// or a different frame any number of times, which is what the idempotence
/// property (§8.2) exercises directly.
pub struct ZoneAnalyzerBuilder {
    indicator: Option<IndicatorSpec>,
    detection: Option<DetectionSpec>,
    strategies: FeatureStrategySelection,
    clustering: ClusteringSpec,
    cache_enabled: bool,
    seed: u64,
    cache: RefCell<HashMap<String, AnalysisResult>>,
}

impl Default for ZoneAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneAnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            indicator: None,
            detection: None,
            strategies: FeatureStrategySelection::default(),
            clustering: ClusteringSpec::default(),
            cache_enabled: false,
            seed: 0,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Appends indicator columns by invoking C1 before detection runs.
    pub fn with_indicator(mut self, spec: IndicatorSpec) -> Self {
        self.indicator = Some(spec);
        self
    }

    /// Selects the C2 detection strategy.
    pub fn detect_zones(mut self, spec: DetectionSpec) -> Self {
        self.detection = Some(spec);
        self
    }

    /// Selects which C3 feature strategies run, replacing any prior selection.
    pub fn with_strategies(mut self, selection: FeatureStrategySelection) -> Self {
        self.strategies = selection;
        self
    }

    /// Overrides the scope of the currently configured swing strategy (or
    /// enables swing with defaults if none was selected yet). Default scope
    /// is `global` (§4.3.1).
    pub fn with_swing_scope(mut self, scope: SwingScope) -> Self {
        let mut swing = self.strategies.swing.take().unwrap_or_default();
        swing.scope = scope;
        self.strategies.swing = Some(swing);
        self
    }

    /// Enables ATR-scaled `deviation`/`min_amplitude` thresholds for swing
    /// detection (§4.3.1 "Auto-thresholds").
    pub fn with_auto_swing_thresholds(mut self, enabled: bool) -> Self {
        let mut swing = self.strategies.swing.take().unwrap_or_default();
        swing.auto_thresholds = enabled;
        self.strategies.swing = Some(swing);
        self
    }

    /// Applies a named swing parameter preset. Unknown names are a no-op.
    pub fn with_swing_preset(mut self, name: &str) -> Self {
        if let Some(preset) = swing_preset(name) {
            self.strategies.swing = Some(preset);
        }
        self
    }

    /// Enables k-means clustering over a normalized numeric feature subset
    /// (§4.4 step 7).
    pub fn analyze(mut self, clustering: bool, n_clusters: Option<usize>) -> Self {
        self.clustering.enabled = clustering;
        if let Some(k) = n_clusters {
            self.clustering.n_clusters = k;
        }
        self
    }

    /// Toggles the optional result cache, keyed by `(spec, frame)` content
    /// hash (§4.4, §10.4). Disabled by default, as required for tests (§5).
    pub fn with_cache(mut self, enable: bool) -> Self {
        self.cache_enabled = enable;
        self
    }

    /// Sets the master seed threaded to clustering and (downstream) Monte
    /// Carlo consumers via a `SeedHierarchy` (§9.1).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn to_spec(&self) -> Result<PipelineSpec, BquantError> {
        let detection = self
            .detection
            .clone()
            .ok_or_else(|| DetectionError::new("no detection strategy configured"))?;
        Ok(PipelineSpec {
            indicator: self.indicator.clone(),
            detection,
            strategies: self.strategies.clone(),
            clustering: self.clustering.clone(),
            seed: self.seed,
        })
    }

    /// Executes the pipeline (§4.4 steps 1-8) against `frame`.
    pub fn build(&self, frame: &MarketFrame) -> Result<AnalysisResult, BquantError> {
        frame.validate()?;
        let spec = self.to_spec()?;

        let cache_key = self
            .cache_enabled
            .then(|| format!("{}:{}", spec.fingerprint(), frame.content_fingerprint()));
        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.borrow().get(key) {
                return Ok(cached.clone());
            }
        }

        let result = execute(frame, &spec)?;

        if let Some(key) = cache_key {
            self.cache.borrow_mut().insert(key, result.clone());
        }
        Ok(result)
    }
}

fn execute(frame: &MarketFrame, spec: &PipelineSpec) -> Result<AnalysisResult, BquantError> {
    // Step 1-2: copy the input frame, append indicator columns if requested.
    let mut working = frame.clone();
    if let Some(indicator_spec) = &spec.indicator {
        let registry = IndicatorRegistry::new();
        working = registry.compute(&working, indicator_spec)?;
    }

    // Step 3: detect zones.
    let mut zones = detect_zones(&working, &spec.detection)?;

    // Auto-thresholds (§4.3.1) scale off the parent frame's ATR, computed
    // once regardless of swing scope.
    let atr_pct = spec
        .strategies
        .swing
        .as_ref()
        .filter(|s| s.auto_thresholds)
        .and_then(|_| frame_atr_pct(&working));

    // Step 4: global pivot pre-pass, shared read-only by every zone's
    // attribution step rather than re-run per zone (§9.1).
    let global_pivots = match &spec.strategies.swing {
        Some(swing_spec) if swing_spec.scope == SwingScope::Global => {
            Some(swing::find_swings(working.bars(), swing_spec, atr_pct))
        }
        _ => None,
    };

    let feature_set = FeatureStrategySet {
        swing: spec.strategies.swing.clone(),
        shape: spec.strategies.shape,
        divergence: spec.strategies.divergence,
        volume: spec.strategies.volume,
        volatility: spec.strategies.volatility,
    };

    // Step 5-6: per-zone feature strategies, then universal predicates. Each
    // zone's work only reads the shared frame/feature_set/global_pivots and
    // writes its own `Zone`, so the whole loop runs over Rayon.
    zones.par_iter_mut().for_each(|zone| {
        apply_all(zone, &working, &feature_set, global_pivots.as_deref(), atr_pct);
        compute_universal_predicates(zone, &working);
    });

    // Step 7: optional clustering.
    let cluster_summary = if spec.clustering.enabled {
        apply_clustering(&mut zones, spec.clustering.n_clusters, spec.seed)
    } else {
        None
    };

    // Step 8: assemble the result.
    let indicator_context = zones
        .first()
        .map(|z| z.indicator_context.clone())
        .unwrap_or_else(|| detection_context(&spec.detection));
    let statistics = compute_statistics(&zones, cluster_summary);

    Ok(AnalysisResult {
        zones,
        statistics,
        indicator_context,
        generated_at: Utc::now(),
    })
}

/// Reconstructs the `IndicatorContext` a detection spec would have produced,
/// for the (rare) case of zero zones where no zone exists to read it from.
fn detection_context(spec: &DetectionSpec) -> IndicatorContext {
    match spec {
        DetectionSpec::ZeroCrossing { indicator_col, .. } => {
            IndicatorContext::new(indicator_col, "zero_crossing")
        }
        DetectionSpec::Threshold { indicator_col, .. } => {
            IndicatorContext::new(indicator_col, "threshold").with_bounded(true)
        }
        DetectionSpec::LineCrossing { line1_col, line2_col, .. } => {
            IndicatorContext::new(line1_col, "line_crossing").with_signal_line(line2_col)
        }
    }
}

/// Mean ATR expressed as a fraction of mean close, over the whole frame —
/// the scale factor auto-thresholds use (§4.3.1).
fn frame_atr_pct(frame: &MarketFrame) -> Option<f64> {
    let bars = frame.bars();
    if bars.len() < 15 {
        return None;
    }
    let atr = Atr::new(14).compute(bars);
    let closes = frame.close();
    let pairs: Vec<(f64, f64)> = atr
        .iter()
        .zip(closes.iter())
        .filter(|(a, c)| a.is_finite() && c.is_finite())
        .map(|(a, c)| (*a, *c))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    let atr_values: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let close_values: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let close_mean = mean(&close_values);
    if close_mean.abs() < 1e-12 {
        None
    } else {
        Some(mean(&atr_values) / close_mean)
    }
}

/// Universal predicates computed by the pipeline itself, not by any feature
/// strategy (§4.3, last paragraph).
fn compute_universal_predicates(zone: &mut Zone, frame: &MarketFrame) {
    let closes = frame
        .column_slice("close", zone.start_idx, zone.end_idx)
        .unwrap_or_default();
    let highs = frame
        .column_slice("high", zone.start_idx, zone.end_idx)
        .unwrap_or_default();
    let lows = frame
        .column_slice("low", zone.start_idx, zone.end_idx)
        .unwrap_or_default();
    if closes.is_empty() {
        return;
    }

    let max_high = highs.iter().cloned().fold(f64::MIN, f64::max);
    let min_low = lows.iter().cloned().fold(f64::MAX, f64::min);
    let price_range_pct = if zone.start_price.abs() > 1e-12 {
        (max_high - min_low) / zone.start_price
    } else {
        0.0
    };

    zone.features.insert("duration", zone.duration as i64);
    zone.features.insert("price_return", zone.price_return());
    zone.features.insert("price_range_pct", price_range_pct);

    if let Some(indicator) =
        frame.column_slice(&zone.indicator_context.detection_indicator, zone.start_idx, zone.end_idx)
    {
        let pairs: Vec<(f64, f64)> = closes
            .iter()
            .zip(indicator.iter())
            .filter(|(_, i)| i.is_finite())
            .map(|(c, i)| (*c, *i))
            .collect();
        if pairs.len() >= 2 {
            let cs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let is: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            zone.features.insert("correlation_price_hist", pearson_correlation(&cs, &is));
        }
    }

    match zone.zone_type {
        ZoneType::Bull => {
            let mut peak = closes[0];
            let mut max_drawdown = 0.0_f64;
            for &c in &closes {
                if c > peak {
                    peak = c;
                }
                let drawdown = (c - peak) / peak.max(1e-12);
                if drawdown < max_drawdown {
                    max_drawdown = drawdown;
                }
            }
            zone.features.insert("drawdown_from_peak", max_drawdown);
        }
        ZoneType::Bear => {
            let mut trough = closes[0];
            let mut max_rally = 0.0_f64;
            for &c in &closes {
                if c < trough {
                    trough = c;
                }
                let rally = (c - trough) / trough.max(1e-12);
                if rally > max_rally {
                    max_rally = rally;
                }
            }
            zone.features.insert("rally_from_trough", max_rally);
        }
        ZoneType::Neutral => {}
    }
}

/// Numeric feature keys present (and finite) on every zone, in first-seen
/// insertion order — the uniform vector k-means needs (§4.4 step 7).
fn clustering_feature_keys(zones: &[Zone]) -> Vec<String> {
    let Some(first) = zones.first() else {
        return vec![];
    };
    first
        .features
        .keys()
        .filter(|k| !k.starts_with("metadata"))
        .filter(|&k| zones.iter().all(|z| z.features.get_f64(k).map(f64::is_finite).unwrap_or(false)))
        .map(str::to_string)
        .collect()
}

fn apply_clustering(zones: &mut [Zone], n_clusters: usize, seed: u64) -> Option<ClusterSummary> {
    let keys = clustering_feature_keys(zones);
    if keys.is_empty() {
        return None;
    }
    let rows: Vec<Vec<f64>> = zones
        .iter()
        .map(|z| keys.iter().map(|k| z.features.get_f64(k).unwrap_or(0.0)).collect())
        .collect();

    let seeds = SeedHierarchy::new(seed);
    let result = kmeans(&rows, n_clusters, seeds.sub_seed("clustering"))?;
    for (zone, &cluster) in zones.iter_mut().zip(result.assignments.iter()) {
        zone.cluster_id = Some(cluster);
    }
    Some(ClusterSummary { k: n_clusters, sizes: result.sizes, centroids: result.centroids })
}

fn duration_distribution(durations: &[f64]) -> DurationDistribution {
    if durations.is_empty() {
        return DurationDistribution { count: 0, mean: 0.0, median: 0.0, p25: 0.0, p75: 0.0, min: 0.0, max: 0.0 };
    }
    DurationDistribution {
        count: durations.len(),
        mean: mean(durations),
        median: median(durations),
        p25: quantile(durations, 0.25),
        p75: quantile(durations, 0.75),
        min: durations.iter().cloned().fold(f64::INFINITY, f64::min),
        max: durations.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Mean of every numeric feature present on any zone in `subset`, keyed in
/// first-seen insertion order across the subset.
fn avg_features(subset: &[&Zone]) -> FeatureMap {
    let mut key_order: Vec<String> = Vec::new();
    for zone in subset {
        for key in zone.features.keys() {
            if key.starts_with("metadata") {
                continue;
            }
            if !key_order.iter().any(|k| k == key) {
                key_order.push(key.to_string());
            }
        }
    }
    let mut out = FeatureMap::new();
    for key in key_order {
        let values: Vec<f64> = subset
            .iter()
            .filter_map(|z| z.features.get_f64(&key))
            .filter(|v| v.is_finite())
            .collect();
        if !values.is_empty() {
            out.insert(key, mean(&values));
        }
    }
    out
}

fn compute_statistics(zones: &[Zone], cluster_summary: Option<ClusterSummary>) -> Statistics {
    let mut count_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for zone in zones {
        *count_by_type.entry(zone.zone_type.as_str().to_string()).or_insert(0) += 1;
    }

    let durations: Vec<f64> = zones.iter().map(|z| z.duration as f64).collect();
    let duration_overall = duration_distribution(&durations);

    let mut duration_by_type: BTreeMap<String, DurationDistribution> = BTreeMap::new();
    let mut avg_features_by_type: BTreeMap<String, FeatureMap> = BTreeMap::new();
    for zone_type in [ZoneType::Bull, ZoneType::Bear, ZoneType::Neutral] {
        let subset: Vec<&Zone> = zones.iter().filter(|z| z.zone_type == zone_type).collect();
        if subset.is_empty() {
            continue;
        }
        let subset_durations: Vec<f64> = subset.iter().map(|z| z.duration as f64).collect();
        duration_by_type.insert(zone_type.as_str().to_string(), duration_distribution(&subset_durations));
        avg_features_by_type.insert(zone_type.as_str().to_string(), avg_features(&subset));
    }

    let mut transition_matrix = [[0usize; 3]; 3];
    for pair in zones.windows(2) {
        let from = zone_type_index(pair[0].zone_type);
        let to = zone_type_index(pair[1].zone_type);
        transition_matrix[from][to] += 1;
    }

    Statistics { count_by_type, duration_overall, duration_by_type, avg_features_by_type, transition_matrix, cluster_summary }
}
