//! `threshold`: segments a bounded oscillator by fixed upper/lower bands.

use super::{apply_min_duration, make_zone};
use crate::error::DetectionError;
use crate::frame::MarketFrame;
use crate::types::{IndicatorContext, Zone, ZoneType};

pub fn detect_threshold(
    frame: &MarketFrame,
    indicator_col: &str,
    upper_threshold: f64,
    lower_threshold: f64,
    require_cross: bool,
) -> Result<Vec<Zone>, DetectionError> {
    let values = frame
        .column_owned(indicator_col)
        .ok_or_else(|| DetectionError::new(format!("missing column `{indicator_col}`")))?;
    let n = values.len();

    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return Ok(vec![]);
    };

    let raw_type = |v: f64| -> ZoneType {
        if v >= upper_threshold {
            ZoneType::Bull
        } else if v <= lower_threshold {
            ZoneType::Bear
        } else {
            ZoneType::Neutral
        }
    };

    let mut zones = Vec::new();
    let mut run_type = raw_type(values[start]);
    let mut run_start = start;

    if require_cross && run_type != ZoneType::Neutral {
        // The series opens inside the band; without an observed crossing the
        // opening run is treated as neutral until the first actual cross.
        run_type = ZoneType::Neutral;
    }

    for i in (start + 1)..=n {
        let t = if i == n { None } else { Some(raw_type(values[i])) };
        match t {
            Some(t) if t == run_type => continue,
            Some(t) => {
                if run_type != ZoneType::Neutral {
                    let ctx = make_ctx(indicator_col);
                    zones.push(make_zone(frame, run_start, i, run_type, ctx));
                }
                run_start = i;
                run_type = t;
            }
            None => {
                if run_type != ZoneType::Neutral {
                    let ctx = make_ctx(indicator_col);
                    zones.push(make_zone(frame, run_start, i, run_type, ctx));
                }
            }
        }
    }

    Ok(apply_min_duration(zones, frame, min_duration_noop()))
}

fn make_ctx(indicator_col: &str) -> IndicatorContext {
    IndicatorContext::new(indicator_col, "threshold").with_bounded(true)
}

// `threshold` has no `min_duration` parameter in its spec signature; kept as
// a named constant so the shared helper's signature stays uniform across
// strategies without threading an unused `Option` through every call site.
fn min_duration_noop() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MarketFrame;
    use crate::indicators::make_bars;

    fn frame_with(values: Vec<f64>) -> MarketFrame {
        let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; values.len()]));
        frame.set_column("RSI", values);
        frame
    }

    #[test]
    fn scenario_c_bounded_oscillator_zones_respect_thresholds() {
        let n = 300;
        let values: Vec<f64> = (0..n)
            .map(|i| 50.0 + 45.0 * (2.0 * std::f64::consts::PI * i as f64 / 37.0).sin())
            .collect();
        let frame = frame_with(values.clone());
        let zones = detect_threshold(&frame, "RSI", 70.0, 30.0, false).unwrap();

        for i in 1..zones.len() {
            assert!(zones[i - 1].end_idx <= zones[i].start_idx);
        }
        for z in &zones {
            let slice = &values[z.start_idx..z.end_idx];
            match z.zone_type {
                ZoneType::Bull => assert!(slice.iter().all(|v| *v >= 70.0)),
                ZoneType::Bear => assert!(slice.iter().all(|v| *v <= 30.0)),
                ZoneType::Neutral => panic!("neutral zones are never emitted"),
            }
            assert_eq!(z.indicator_context.bounded, Some(true));
        }
    }

    #[test]
    fn constant_value_above_upper_emits_single_zone() {
        let frame = frame_with(vec![80.0; 10]);
        let zones = detect_threshold(&frame, "RSI", 70.0, 30.0, false).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].zone_type, ZoneType::Bull);
    }

    #[test]
    fn constant_value_mid_band_emits_no_zones() {
        let frame = frame_with(vec![50.0; 10]);
        let zones = detect_threshold(&frame, "RSI", 70.0, 30.0, false).unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn require_cross_suppresses_zone_opening_inside_band() {
        let values = vec![80.0, 80.0, 50.0, 50.0, 80.0, 80.0];
        let frame = frame_with(values);
        let zones = detect_threshold(&frame, "RSI", 70.0, 30.0, true).unwrap();
        // Opens inside the bull band, but require_cross suppresses the opening
        // run; only the re-entry after the neutral dip is a zone.
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].start_idx, 4);
    }

    #[test]
    fn missing_column_errors() {
        let frame = frame_with(vec![1.0]);
        assert!(detect_threshold(&frame, "NOPE", 70.0, 30.0, false).is_err());
    }
}
