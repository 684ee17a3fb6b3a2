//! Volatility (combined) feature strategy (§4.3.5).
//!
//! Blends intra-zone return volatility with a Bollinger-width proxy and an
//! ATR-normalized return, all computed directly from the zone's OHLC slice
//! so the strategy never depends on which indicator the pipeline happened
//! to compute.

use crate::frame::MarketFrame;
use crate::types::{FeatureMap, Zone};

use crate::mathutil::std_dev;

pub const KEY: &str = "volatility";

pub fn compute(zone: &Zone, frame: &MarketFrame) -> FeatureMap {
    let mut out = FeatureMap::new();
    let bars = frame.slice(zone.start_idx, zone.end_idx);
    if bars.len() < 2 {
        return out;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0].max(1e-12)).collect();
    let return_std = if returns.len() >= 2 { std_dev(&returns) } else { 0.0 };

    let max_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let min_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let mean_close = closes.iter().sum::<f64>() / closes.len() as f64;
    let bollinger_width_pct = if mean_close > 0.0 { (max_high - min_low) / mean_close } else { 0.0 };

    let atr = average_true_range(bars);
    let price_return = zone.price_return();
    let atr_normalized_return = if atr > 0.0 { price_return / (atr / zone.start_price.max(1e-12)) } else { 0.0 };

    // Blend: annualization-free combination of return dispersion (scaled to a
    // roughly comparable magnitude) and band width, clipped to [0, 10].
    let raw_score = return_std * 100.0 + bollinger_width_pct * 10.0;
    let volatility_score = raw_score.clamp(0.0, 10.0);

    let regime = if volatility_score < 3.0 {
        "low"
    } else if volatility_score < 7.0 {
        "normal"
    } else {
        "high"
    };

    out.insert("volatility_score", volatility_score);
    out.insert("volatility_regime", regime);
    out.insert("bollinger_width_pct", bollinger_width_pct);
    out.insert("atr_normalized_return", atr_normalized_return);
    out
}

fn average_true_range(bars: &[crate::types::Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let mut trs = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let tr = if i == 0 {
            bars[i].high - bars[i].low
        } else {
            let hl = bars[i].high - bars[i].low;
            let hc = (bars[i].high - bars[i - 1].close).abs();
            let lc = (bars[i].low - bars[i - 1].close).abs();
            hl.max(hc).max(lc)
        };
        trs.push(tr);
    }
    trs.iter().sum::<f64>() / trs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::types::{IndicatorContext, ZoneType};

    fn zone_from_closes(closes: Vec<f64>) -> (Zone, MarketFrame) {
        let n = closes.len();
        let frame = MarketFrame::from_bars(make_bars(&closes));
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
    fn volatility_score_is_clamped_and_regime_consistent() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64 * 3.0).sin() * 20.0).collect();
        let (zone, frame) = zone_from_closes(closes);
        let out = compute(&zone, &frame);
        let score = out.get_f64("volatility_score").unwrap();
        assert!((0.0..=10.0).contains(&score));
        let regime = out.get("volatility_regime").unwrap().as_str().unwrap();
        assert!(["low", "normal", "high"].contains(&regime));
    }

    #[test]
    fn flat_series_is_low_volatility() {
        let (zone, frame) = zone_from_closes(vec![100.0; 10]);
        let out = compute(&zone, &frame);
        assert_eq!(out.get("volatility_regime").unwrap().as_str(), Some("low"));
    }
}
