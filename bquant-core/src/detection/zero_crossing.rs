//! `zero_crossing`: segments a series by the sign of one indicator column.
//!
//! Resolves the open question in §9.2: an isolated zero bar is absorbed into
//! the zone of the nearest established sign rather than starting its own
//! `neutral` run, unless the caller opts in via `zone_types`. A zero bar
//! preceding any established sign (no prior zone to absorb into) is instead
//! folded forward into the first zone that follows it.

use super::{apply_min_duration, make_zone};
use crate::error::DetectionError;
use crate::frame::MarketFrame;
use crate::spec::ZoneTypeFilter;
use crate::types::{IndicatorContext, Zone, ZoneType};

pub fn detect_zero_crossing(
    frame: &MarketFrame,
    indicator_col: &str,
    min_duration: Option<usize>,
    zone_types: &[ZoneTypeFilter],
) -> Result<Vec<Zone>, DetectionError> {
    let values = frame
        .column_owned(indicator_col)
        .ok_or_else(|| DetectionError::new(format!("missing column `{indicator_col}`")))?;
    let n = values.len();
    let neutral_enabled = zone_types.contains(&ZoneTypeFilter::Neutral);

    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return Ok(vec![]);
    };

    let mut effective: Vec<ZoneType> = Vec::with_capacity(n - start);
    let mut last_signed: Option<ZoneType> = None;
    for &v in &values[start..n] {
        let t = if v.is_nan() {
            last_signed.unwrap_or(ZoneType::Neutral)
        } else if v > 0.0 {
            last_signed = Some(ZoneType::Bull);
            ZoneType::Bull
        } else if v < 0.0 {
            last_signed = Some(ZoneType::Bear);
            ZoneType::Bear
        } else if neutral_enabled {
            ZoneType::Neutral
        } else {
            last_signed.unwrap_or(ZoneType::Neutral)
        };
        effective.push(t);
    }

    if !neutral_enabled {
        if let Some(first_signed) = effective.iter().position(|t| *t != ZoneType::Neutral) {
            let fill = effective[first_signed];
            for e in &mut effective[..first_signed] {
                *e = fill;
            }
        } else {
            // Constant (all-zero) series with neutral disabled: no sign ever appears.
            return Ok(vec![]);
        }
    }

    let mut zones = Vec::new();
    let mut run_start = start;
    for i in (start + 1)..=n {
        let boundary = i == n || effective[i - start] != effective[i - 1 - start];
        if boundary {
            let run_type = effective[i - 1 - start];
            if run_type != ZoneType::Neutral || neutral_enabled {
                let ctx = IndicatorContext::new(indicator_col, "zero_crossing");
                zones.push(make_zone(frame, run_start, i, run_type, ctx));
            }
            run_start = i;
        }
    }

    Ok(apply_min_duration(zones, frame, min_duration))
}
