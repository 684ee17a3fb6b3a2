//! Volume (standard) feature strategy (§4.3.4). Requires `volume`; when the
//! frame has none, the strategy returns an empty record and the pipeline
//! records `features.metadata.volume.skipped=true` (§6.1).

use crate::frame::MarketFrame;
use crate::types::{FeatureMap, Zone};

use crate::mathutil::pearson_correlation;

pub const KEY: &str = "volume";

pub fn compute(zone: &Zone, frame: &MarketFrame) -> (FeatureMap, bool) {
    let mut out = FeatureMap::new();
    let Some(volume) = frame.column_slice("volume", zone.start_idx, zone.end_idx) else {
        return (out, true);
    };
    if volume.iter().any(|v| v.is_nan()) {
        return (out, true);
    }

    let avg_volume = volume.iter().sum::<f64>() / volume.len() as f64;
    out.insert("avg_volume", avg_volume);

    let trend = if volume.len() >= 2 {
        let half = volume.len() / 2;
        let first_half_avg = volume[..half.max(1)].iter().sum::<f64>() / half.max(1) as f64;
        let second_half_avg = volume[half..].iter().sum::<f64>() / (volume.len() - half).max(1) as f64;
        let delta = (second_half_avg - first_half_avg) / first_half_avg.max(1e-12);
        if delta > 0.05 {
            "rising"
        } else if delta < -0.05 {
            "falling"
        } else {
            "flat"
        }
    } else {
        "flat"
    };
    out.insert("volume_trend", trend);

    if let Some(indicator) = frame.column_slice(&zone.indicator_context.detection_indicator, zone.start_idx, zone.end_idx) {
        let pairs: Vec<(f64, f64)> = volume
            .iter()
            .zip(indicator.iter())
            .filter(|(_, i)| i.is_finite())
            .map(|(v, i)| (*v, *i))
            .collect();
        if pairs.len() >= 2 {
            let vs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let is: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            out.insert("volume_indicator_corr", pearson_correlation(&vs, &is));
        }
    }

    (out, false)
}
