//! Divergence (classic) feature strategy (§4.3.3).
//!
//! Pairs price pivots with indicator pivots inside the zone and compares
//! their direction. A `bull` zone carries classical *bearish* divergence
//! when price prints a higher high while the indicator prints a lower high
//! at the paired pivots; bearish zones mirror this on lows.

use crate::frame::MarketFrame;
use crate::spec::{SwingAlgorithm, SwingSpec, SwingScope};
use crate::types::{FeatureMap, Scalar, Zone, ZoneType};

use crate::features::swing::find_swings;

pub const KEY: &str = "divergence";

fn default_pivot_spec() -> SwingSpec {
    SwingSpec {
        algorithm: SwingAlgorithm::ZigZag,
        scope: SwingScope::PerZone,
        auto_thresholds: false,
        deviation_pct: 0.02,
        min_amplitude_pct: 0.01,
        min_legs: 1,
    }
}

pub fn compute(zone: &Zone, frame: &MarketFrame) -> FeatureMap {
    let mut out = FeatureMap::new();
    let bars = frame.slice(zone.start_idx, zone.end_idx);
    let Some(indicator) = frame.column_slice(&zone.indicator_context.detection_indicator, zone.start_idx, zone.end_idx) else {
        return out;
    };

    let price_pivots = find_swings(bars, &default_pivot_spec(), None);
    if price_pivots.len() < 2 {
        out.insert("has_classic_divergence", false);
        out.insert("divergence_count", 0i64);
        out.insert("divergence_type", "none");
        out.insert("divergence_strength", 0.0);
        return out;
    }

    let wanted = match zone.zone_type {
        ZoneType::Bull => crate::types::SwingType::Peak,
        ZoneType::Bear => crate::types::SwingType::Trough,
        ZoneType::Neutral => crate::types::SwingType::Peak,
    };

    let relevant: Vec<_> = price_pivots.iter().filter(|p| p.swing_type == wanted).collect();
    if relevant.len() < 2 {
        out.insert("has_classic_divergence", false);
        out.insert("divergence_count", 0i64);
        out.insert("divergence_type", "none");
        out.insert("divergence_strength", 0.0);
        return out;
    }

    let mut divergence_count = 0usize;
    let mut max_strength = 0.0_f64;
    let mut divergence_type = "none";

    for pair in relevant.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let ind_a = indicator[a.index.min(indicator.len() - 1)];
        let ind_b = indicator[b.index.min(indicator.len() - 1)];
        if !ind_a.is_finite() || !ind_b.is_finite() {
            continue;
        }

        let price_rising = b.price > a.price;
        let ind_rising = ind_b > ind_a;

        let divergent = price_rising != ind_rising;
        if divergent {
            divergence_count += 1;
            let strength = (b.price - a.price).abs() / a.price.max(1e-12)
                + (ind_b - ind_a).abs() / ind_a.abs().max(1e-12);
            max_strength = max_strength.max(strength);
            divergence_type = match (zone.zone_type, price_rising) {
                (ZoneType::Bull, true) => "regular_bear",
                (ZoneType::Bull, false) => "hidden_bear",
                (ZoneType::Bear, false) => "regular_bull",
                (ZoneType::Bear, true) => "hidden_bull",
                _ => "none",
            };
        }
    }

    out.insert("has_classic_divergence", divergence_count > 0);
    out.insert("divergence_count", divergence_count as i64);
    out.insert("divergence_type", divergence_type);
    out.insert("divergence_strength", max_strength);
    out
}
