//! `line_crossing`: segments a series by the relative order of two columns.

use super::{apply_min_duration, make_zone};
use crate::error::DetectionError;
use crate::frame::MarketFrame;
use crate::types::{IndicatorContext, Zone, ZoneType};

pub fn detect_line_crossing(
    frame: &MarketFrame,
    line1_col: &str,
    line2_col: &str,
    min_duration: Option<usize>,
) -> Result<Vec<Zone>, DetectionError> {
    let line1 = frame
        .column_owned(line1_col)
        .ok_or_else(|| DetectionError::new(format!("missing column `{line1_col}`")))?;
    let line2 = frame
        .column_owned(line2_col)
        .ok_or_else(|| DetectionError::new(format!("missing column `{line2_col}`")))?;
    let n = line1.len();

    let Some(start) = (0..n).find(|&i| !line1[i].is_nan() && !line2[i].is_nan()) else {
        return Ok(vec![]);
    };

    let raw_type = |i: usize| -> ZoneType {
        if line1[i] > line2[i] {
            ZoneType::Bull
        } else if line1[i] < line2[i] {
            ZoneType::Bear
        } else {
            ZoneType::Neutral
        }
    };

    let mut zones = Vec::new();
    let mut run_type = raw_type(start);
    let mut run_start = start;

    for i in (start + 1)..=n {
        let t = if i == n { None } else { Some(raw_type(i)) };
        match t {
            Some(t) if t == run_type => continue,
            Some(t) => {
                if run_type != ZoneType::Neutral {
                    zones.push(make_zone(frame, run_start, i, run_type, make_ctx(line1_col, line2_col)));
                }
                run_start = i;
                run_type = t;
            }
            None => {
                if run_type != ZoneType::Neutral {
                    zones.push(make_zone(frame, run_start, i, run_type, make_ctx(line1_col, line2_col)));
                }
            }
        }
    }

    Ok(apply_min_duration(zones, frame, min_duration))
}

fn make_ctx(line1_col: &str, line2_col: &str) -> IndicatorContext {
    IndicatorContext::new(line1_col, "line_crossing").with_signal_line(line2_col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn frame_with(line1: Vec<f64>, line2: Vec<f64>) -> MarketFrame {
        let mut frame = MarketFrame::from_bars(make_bars(&vec![100.0; line1.len()]));
        frame.set_column("FAST", line1);
        frame.set_column("SLOW", line2);
        frame
    }

    #[test]
    fn bull_while_line1_above_line2() {
        let frame = frame_with(vec![2.0, 3.0, 1.0, 0.5, 4.0], vec![1.0, 1.0, 1.0, 1.0, 1.0]);
        let zones = detect_line_crossing(&frame, "FAST", "SLOW", None).unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].zone_type, ZoneType::Bull);
        assert_eq!(zones[1].zone_type, ZoneType::Bear);
        assert_eq!(zones[2].zone_type, ZoneType::Bull);
    }

    #[test]
    fn context_carries_signal_line() {
        let frame = frame_with(vec![2.0, 1.0], vec![1.0, 2.0]);
        let zones = detect_line_crossing(&frame, "FAST", "SLOW", None).unwrap();
        assert_eq!(zones[0].indicator_context.detection_indicator, "FAST");
        assert_eq!(zones[0].indicator_context.signal_line.as_deref(), Some("SLOW"));
    }

    #[test]
    fn equal_lines_emit_no_zone() {
        let frame = frame_with(vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]);
        let zones = detect_line_crossing(&frame, "FAST", "SLOW", None).unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn min_duration_merges_short_run_right() {
        let frame = frame_with(vec![2.0, 1.0, 2.0, 2.0, 2.0], vec![1.0, 2.0, 1.0, 1.0, 1.0]);
        let zones = detect_line_crossing(&frame, "FAST", "SLOW", Some(2)).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].zone_type, ZoneType::Bear);
    }

    #[test]
    fn missing_column_errors() {
        let frame = frame_with(vec![1.0], vec![1.0]);
        assert!(detect_line_crossing(&frame, "NOPE", "SLOW", None).is_err());
    }
}
