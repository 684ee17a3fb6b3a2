//! Zone Detection Strategies (C2).
//!
//! Each strategy consumes the indicator-enriched frame and emits zones with
//! `features` empty and `indicator_context` populated. All three strategies
//! share inclusive-start/exclusive-end boundaries and an optional
//! `min_duration` filter applied after initial segmentation.

mod line_crossing;
mod threshold;
mod zero_crossing;

use chrono::{DateTime, Utc};

use crate::error::DetectionError;
use crate::frame::MarketFrame;
use crate::spec::DetectionSpec;
use crate::types::{IndicatorContext, Zone, ZoneType};

pub use line_crossing::detect_line_crossing;
pub use threshold::detect_threshold;
pub use zero_crossing::detect_zero_crossing;

/// Dispatches to the concrete strategy named by `spec` and assigns
/// `zone_id` in detection order, starting at 0 (§3.2 invariant 3).
pub fn detect_zones(frame: &MarketFrame, spec: &DetectionSpec) -> Result<Vec<Zone>, DetectionError> {
    let mut zones = match spec {
        DetectionSpec::ZeroCrossing { indicator_col, min_duration, zone_types } => {
            detect_zero_crossing(frame, indicator_col, *min_duration, zone_types)?
        }
        DetectionSpec::Threshold { indicator_col, upper_threshold, lower_threshold, require_cross } => {
            detect_threshold(frame, indicator_col, *upper_threshold, *lower_threshold, *require_cross)?
        }
        DetectionSpec::LineCrossing { line1_col, line2_col, min_duration } => {
            detect_line_crossing(frame, line1_col, line2_col, *min_duration)?
        }
    };
    for (id, zone) in zones.iter_mut().enumerate() {
        zone.zone_id = id;
    }
    Ok(zones)
}

/// Shared constructor: builds a `Zone` from a `[start_idx, end_idx)` segment,
/// filling in price/time endpoints and universal metadata. `zone_id` is a
/// placeholder reassigned by [`detect_zones`] after the full sequence exists.
fn make_zone(frame: &MarketFrame, start_idx: usize, end_idx: usize, zone_type: ZoneType, ctx: IndicatorContext) -> Zone {
    let bars = frame.bars();
    let start_time: DateTime<Utc> = bars[start_idx].timestamp;
    let end_time: DateTime<Utc> = bars[end_idx - 1].timestamp;
    Zone {
        zone_id: 0,
        zone_type,
        start_idx,
        end_idx,
        start_time,
        end_time,
        start_price: bars[start_idx].close,
        end_price: bars[end_idx - 1].close,
        duration: end_idx - start_idx,
        indicator_context: ctx,
        swing_context: None,
        features: Default::default(),
        cluster_id: None,
    }
}

/// Merges runs shorter than `min_duration` into their right neighbor; drops a
/// trailing short run with no right neighbor (§4.2).
fn apply_min_duration(mut zones: Vec<Zone>, frame: &MarketFrame, min_duration: Option<usize>) -> Vec<Zone> {
    let Some(min_duration) = min_duration else {
        return zones;
    };
    let mut i = 0;
    while i < zones.len() {
        if zones[i].duration < min_duration {
            if i + 1 < zones.len() {
                let absorbed = zones.remove(i);
                let next = &mut zones[i];
                next.start_idx = absorbed.start_idx;
                next.duration = next.end_idx - next.start_idx;
                next.start_time = frame.bars()[next.start_idx].timestamp;
                next.start_price = frame.bars()[next.start_idx].close;
                continue;
            } else {
                zones.remove(i);
                continue;
            }
        }
        i += 1;
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MarketFrame;
    use crate::indicators::make_bars;

    fn frame_with_column(closes: &[f64], col: &str, values: Vec<f64>) -> MarketFrame {
        let mut frame = MarketFrame::from_bars(make_bars(closes));
        frame.set_column(col, values);
        frame
    }

    #[test]
    fn zone_ids_assigned_in_order() {
        let frame = frame_with_column(&[1.0; 8], "FICT", vec![1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0]);
        let spec = DetectionSpec::ZeroCrossing {
            indicator_col: "FICT".into(),
            min_duration: None,
            zone_types: vec![],
        };
        let zones = detect_zones(&frame, &spec).unwrap();
        for (i, z) in zones.iter().enumerate() {
            assert_eq!(z.zone_id, i);
        }
    }

    #[test]
    fn missing_column_is_detection_error() {
        let frame = MarketFrame::from_bars(make_bars(&[1.0, 2.0, 3.0]));
        let spec = DetectionSpec::ZeroCrossing {
            indicator_col: "NOPE".into(),
            min_duration: None,
            zone_types: vec![],
        };
        assert!(detect_zones(&frame, &spec).is_err());
    }
}

/// Property-based checks of the §8.1 zone invariants — non-overlap,
/// half-open bounds, and `zone_id` ordering — over arbitrary indicator
/// series, rather than only the example-based cases above.
#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::frame::MarketFrame;
    use crate::indicators::make_bars;
    use crate::spec::ZoneTypeFilter;

    fn assert_zone_invariants(zones: &[Zone], frame_len: usize) {
        for z in zones {
            assert!(z.start_idx < z.end_idx);
            assert!(z.end_idx <= frame_len);
            assert_eq!(z.duration, z.end_idx - z.start_idx);
        }
        for pair in zones.windows(2) {
            assert!(pair[0].end_idx <= pair[1].start_idx);
        }
        for (i, z) in zones.iter().enumerate() {
            assert_eq!(z.zone_id, i);
        }
    }

    proptest! {
        #[test]
        fn zero_crossing_holds_invariants_on_arbitrary_series(
            values in prop::collection::vec(-10.0f64..10.0, 5..200),
            min_duration in prop::option::of(1usize..5),
            include_neutral in any::<bool>(),
        ) {
            let n = values.len();
            let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; n]));
            frame.set_column("FICT", values);
            let zone_types = if include_neutral { vec![ZoneTypeFilter::Neutral] } else { vec![] };
            let spec = DetectionSpec::ZeroCrossing { indicator_col: "FICT".into(), min_duration, zone_types };
            let zones = detect_zones(&frame, &spec).unwrap();
            assert_zone_invariants(&zones, n);
        }

        #[test]
        fn threshold_holds_invariants_on_arbitrary_series(
            values in prop::collection::vec(0.0f64..100.0, 5..200),
            require_cross in any::<bool>(),
        ) {
            let n = values.len();
            let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; n]));
            frame.set_column("RSI", values);
            let spec = DetectionSpec::Threshold {
                indicator_col: "RSI".into(),
                upper_threshold: 70.0,
                lower_threshold: 30.0,
                require_cross,
            };
            let zones = detect_zones(&frame, &spec).unwrap();
            assert_zone_invariants(&zones, n);
        }

        #[test]
        fn line_crossing_holds_invariants_on_arbitrary_series(
            line1 in prop::collection::vec(-5.0f64..5.0, 5..150),
            line2 in prop::collection::vec(-5.0f64..5.0, 5..150),
        ) {
            let n = line1.len().min(line2.len());
            let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; n]));
            frame.set_column("FAST", line1[..n].to_vec());
            frame.set_column("SLOW", line2[..n].to_vec());
            let spec = DetectionSpec::LineCrossing {
                line1_col: "FAST".into(),
                line2_col: "SLOW".into(),
                min_duration: None,
            };
            let zones = detect_zones(&frame, &spec).unwrap();
            assert_zone_invariants(&zones, n);
        }
    }
}
