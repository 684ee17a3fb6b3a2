//! Feature Strategies (C3): pure per-zone computations over a zone's OHLCV
//! slice and indicator context.
//!
//! Each strategy never mutates the zone or parent frame (§4.3). The pipeline
//! (C4) merges each strategy's flat output into `zone.features`, keeping
//! per-strategy diagnostics under `features.metadata.<strategy_key>`.

pub mod divergence;
pub mod shape;
pub mod swing;
pub mod volatility;
pub mod volume;

use crate::error::FeatureError;
use crate::frame::MarketFrame;
use crate::spec::{SwingScope, SwingSpec};
use crate::types::{FeatureMap, SwingPoint, Zone};

/// Which C3 families to run and with what configuration — a thin runtime
/// mirror of `crate::spec::FeatureStrategySelection`.
#[derive(Debug, Clone, Default)]
pub struct FeatureStrategySet {
    pub swing: Option<SwingSpec>,
    pub shape: bool,
    pub divergence: bool,
    pub volume: bool,
    pub volatility: bool,
}

/// Runs every selected strategy over one zone, merging outputs into
/// `zone.features` and recording per-strategy diagnostics or errors.
/// `global_pivots` is `Some` only when `swing.scope == Global` and holds the
/// pivot series computed once over the whole parent frame (§4.4 step 4).
pub fn apply_all(
    zone: &mut Zone,
    frame: &MarketFrame,
    selection: &FeatureStrategySet,
    global_pivots: Option<&[SwingPoint]>,
    atr_pct: Option<f64>,
) {
    if let Some(swing_spec) = &selection.swing {
        run_swing(zone, frame, swing_spec, global_pivots, atr_pct);
    }
    if selection.shape {
        run_catching(zone, "shape", |zone| Ok(shape::compute(zone, frame)));
    }
    if selection.divergence {
        run_catching(zone, "divergence", |zone| Ok(divergence::compute(zone, frame)));
    }
    if selection.volume {
        run_catching(zone, "volume", |zone| {
            let (features, skipped) = volume::compute(zone, frame);
            if skipped {
                let mut meta = FeatureMap::new();
                meta.insert("skipped", true);
                Ok(meta_only("volume", meta))
            } else {
                Ok(features)
            }
        });
    }
    if selection.volatility {
        run_catching(zone, "volatility", |zone| Ok(volatility::compute(zone, frame)));
    }
}

fn run_swing(
    zone: &mut Zone,
    frame: &MarketFrame,
    spec: &SwingSpec,
    global_pivots: Option<&[SwingPoint]>,
    atr_pct: Option<f64>,
) {
    let points = match spec.scope {
        SwingScope::Global => {
            let global = global_pivots.unwrap_or(&[]);
            swing::attribute_to_zone(global, zone.start_idx, zone.end_idx)
        }
        SwingScope::PerZone => {
            let bars = frame.slice(zone.start_idx, zone.end_idx);
            swing::find_swings(bars, spec, atr_pct)
        }
    };
    zone.swing_context = Some(points.clone());
    let metrics = swing::compute_swing_metrics(&points);
    for (key, value) in metrics.into_scalars() {
        zone.features.insert(key, value);
    }
}

/// Wraps a strategy closure so a panic-free `Err` is captured under
/// `features.metadata.errors.<strategy>` instead of aborting the zone loop
/// (§4.4 "Errors"; §7 FeatureError propagation policy).
fn run_catching(zone: &mut Zone, strategy: &str, f: impl FnOnce(&Zone) -> Result<FeatureMap, FeatureError>) {
    match f(zone) {
        Ok(features) => zone.features.merge(features),
        Err(err) => zone.features.insert(format!("metadata.errors.{strategy}"), err.reason),
    }
}

/// Wraps a diagnostics-only record (e.g. the volume skip note) under
/// `features.metadata.<strategy>.*` instead of the flat top level.
fn meta_only(strategy: &str, meta: FeatureMap) -> FeatureMap {
    let mut out = FeatureMap::new();
    for (k, v) in meta.iter() {
        out.insert(format!("metadata.{strategy}.{k}"), v.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::types::{IndicatorContext, ZoneType};

    fn sample_zone() -> (Zone, MarketFrame) {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let n = closes.len();
        let mut frame = MarketFrame::from_bars(make_bars(&closes));
        frame.set_column("FICT", closes.clone());
        let bars_ref = frame.bars();
        let zone = Zone {
            zone_id: 0,
            zone_type: ZoneType::Bull,
            start_idx: 0,
            end_idx: n,
            start_time: bars_ref[0].timestamp,
            end_time: bars_ref[n - 1].timestamp,
            start_price: bars_ref[0].close,
            end_price: bars_ref[n - 1].close,
            duration: n,
            indicator_context: IndicatorContext::new("FICT", "zero_crossing"),
            swing_context: None,
            features: FeatureMap::new(),
            cluster_id: None,
        };
        (zone, frame)
    }

    #[test]
    fn apply_all_runs_every_selected_strategy_without_panicking() {
        let (mut zone, frame) = sample_zone();
        let selection = FeatureStrategySet {
            swing: Some(SwingSpec::default()),
            shape: true,
            divergence: true,
            volume: true,
            volatility: true,
        };
        apply_all(&mut zone, &frame, &selection, None, None);
        assert!(zone.features.contains_key("num_swings"));
        assert!(zone.features.contains_key("volatility_score"));
    }

    #[test]
    fn volume_skip_is_recorded_without_volume_column() {
        let (mut zone, frame) = sample_zone();
        let selection = FeatureStrategySet { volume: true, ..Default::default() };
        apply_all(&mut zone, &frame, &selection, None, None);
        assert_eq!(zone.features.get("metadata.volume.skipped").and_then(|s| s.as_bool()), Some(true));
    }
}
