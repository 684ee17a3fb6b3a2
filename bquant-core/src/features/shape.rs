//! Shape (statistical) feature strategy (§4.3.2).
//!
//! Reads the primary indicator column — and, when present, its signal line —
//! from the zone's `indicator_context` rather than a hard-coded name (§9.2):
//! no feature strategy here ever matches on `"macd"` literally.

use crate::frame::MarketFrame;
use crate::types::{FeatureMap, Zone};

use crate::mathutil::ols_slope;

pub const KEY: &str = "shape";

pub fn compute(zone: &Zone, frame: &MarketFrame) -> FeatureMap {
    let mut out = FeatureMap::new();
    let ctx = &zone.indicator_context;
    let Some(primary) = frame.column_slice(&ctx.detection_indicator, zone.start_idx, zone.end_idx) else {
        return out;
    };
    let clean: Vec<f64> = primary.iter().cloned().filter(|v| v.is_finite()).collect();
    if clean.len() < 3 {
        return out;
    }

    out.insert("hist_skewness", skewness(&clean));
    out.insert("hist_kurtosis", kurtosis(&clean));
    out.insert("hist_smoothness", smoothness(&clean));
    out.insert("hist_slope", ols_slope(&clean));

    let hist_amplitude = clean.iter().cloned().fold(f64::MIN, f64::max)
        - clean.iter().cloned().fold(f64::MAX, f64::min);
    out.insert("hist_amplitude", hist_amplitude);

    // `macd_amplitude` is the amplitude of the *primary* line (signal_line's
    // companion), derived from the context pair rather than a literal column
    // name, honoring the redesign flag in §9.2.
    let amplitude_source = ctx.signal_line.as_deref().unwrap_or(&ctx.detection_indicator);
    if let Some(paired) = frame.column_slice(amplitude_source, zone.start_idx, zone.end_idx) {
        let paired_clean: Vec<f64> = paired.iter().cloned().filter(|v| v.is_finite()).collect();
        if !paired_clean.is_empty() {
            let macd_amplitude = paired_clean.iter().cloned().fold(f64::MIN, f64::max)
                - paired_clean.iter().cloned().fold(f64::MAX, f64::min);
            out.insert("macd_amplitude", macd_amplitude);
        }
    } else {
        out.insert("macd_amplitude", hist_amplitude);
    }

    out
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    if m2 <= 0.0 {
        0.0
    } else {
        m3 / m2.powf(1.5)
    }
}

fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
    if m2 <= 0.0 {
        0.0
    } else {
        m4 / m2.powi(2) - 3.0
    }
}

/// Inverse of the mean absolute second difference: smoother series (small
/// second differences) score higher.
fn smoothness(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let second_diffs: Vec<f64> = values.windows(3).map(|w| (w[2] - 2.0 * w[1] + w[0]).abs()).collect();
    let mean_abs = mean(&second_diffs);
    if mean_abs <= 1e-12 {
        f64::INFINITY
    } else {
        1.0 / mean_abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::types::{IndicatorContext, Zone, ZoneType};

    fn zone_with_hist(values: Vec<f64>) -> (Zone, MarketFrame) {
        let n = values.len();
        let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; n]));
        frame.set_column("macd_hist", values);
        let ctx = IndicatorContext::new("macd_hist", "zero_crossing");
        let bars = frame.bars();
        let zone = Zone {
            zone_id: 0,
            zone_type: ZoneType::Bull,
            start_idx: 0,
            end_idx: n,
            start_time: bars[0].timestamp,
            end_time: bars[n - 1].timestamp,
            start_price: bars[0].close,
            end_price: bars[n - 1].close,
            duration: n,
            indicator_context: ctx,
            swing_context: None,
            features: FeatureMap::new(),
            cluster_id: None,
        };
        (zone, frame)
    }

    #[test]
    fn shape_outputs_finite_values_for_smooth_series() {
        let values: Vec<f64> = (0..30).map(|i| (i as f64 * 0.2).sin()).collect();
        let (zone, frame) = zone_with_hist(values);
        let out = compute(&zone, &frame);
        assert!(out.get_f64("hist_skewness").unwrap().is_finite());
        assert!(out.get_f64("hist_slope").is_some());
    }

    #[test]
    fn missing_column_returns_empty_map() {
        let (mut zone, frame) = zone_with_hist(vec![1.0, 2.0, 3.0]);
        zone.indicator_context = IndicatorContext::new("NOPE", "zero_crossing");
        let out = compute(&zone, &frame);
        assert!(out.is_empty());
    }
}
