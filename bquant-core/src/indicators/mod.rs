//! Indicator Registry & Adapters (C1).
//!
//! `compute(frame, spec)` resolves an [`IndicatorSpec`] to a function that
//! consumes a slice of bars and appends its declared output columns to a
//! working copy of the frame. Indicator implementations never see the
//! caller's original frame and never mutate it.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

use crate::error::IndicatorError;
use crate::frame::MarketFrame;
use crate::spec::{IndicatorSource, IndicatorSpec};
use crate::types::Bar;

/// A single-output indicator over a bar series.
///
/// Multi-column indicators (MACD, Bollinger) are composed of several
/// `Indicator` instances, one per output column, matching the one-series-per-
/// implementation shape used throughout this module.
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;
    fn lookback(&self) -> usize;
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Resolves `(source, name, params)` to the set of named columns it appends.
///
/// `list()` and `create()` give the registry the shape of a lookup table
/// rather than a hard-coded match in the pipeline builder, so adding a new
/// custom indicator never touches `pipeline.rs`.
#[derive(Default)]
pub struct IndicatorRegistry;

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn list(&self) -> &'static [&'static str] {
        &["sma", "ema", "rsi", "macd", "bollinger", "atr"]
    }

    /// Appends the columns declared by `spec` onto a copy of `frame`,
    /// returning the new frame. Never mutates `frame`.
    pub fn compute(&self, frame: &MarketFrame, spec: &IndicatorSpec) -> Result<MarketFrame, IndicatorError> {
        match spec.source {
            IndicatorSource::Preloaded => self.compute_preloaded(frame, spec),
            IndicatorSource::Custom | IndicatorSource::Library => self.compute_builtin(frame, spec),
        }
    }

    fn compute_preloaded(&self, frame: &MarketFrame, spec: &IndicatorSpec) -> Result<MarketFrame, IndicatorError> {
        let columns = spec.params.get("columns").and_then(|v| v.as_str());
        let Some(columns) = columns else {
            return Err(IndicatorError::new(
                &spec.name,
                "preloaded indicator requires a `columns` string parameter",
            ));
        };
        for col in columns.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !frame.has_column(col) {
                return Err(IndicatorError::new(
                    &spec.name,
                    format!("preloaded column `{col}` not present in frame"),
                ));
            }
        }
        Ok(frame.clone())
    }

    fn compute_builtin(&self, frame: &MarketFrame, spec: &IndicatorSpec) -> Result<MarketFrame, IndicatorError> {
        let bars = frame.bars();
        let mut out = frame.clone();

        match spec.name.to_ascii_lowercase().as_str() {
            "sma" => {
                let period = spec.param_usize("period", 20);
                let values = sma::Sma::new(period).compute(bars);
                out.set_column(&format!("sma_{period}"), values);
            }
            "ema" => {
                let period = spec.param_usize("period", 20);
                let values = ema::Ema::new(period).compute(bars);
                out.set_column(&format!("ema_{period}"), values);
            }
            "rsi" => {
                let period = spec.param_usize("period", 14);
                let values = rsi::Rsi::new(period).compute(bars);
                out.set_column(&format!("rsi_{period}"), values);
            }
            "atr" => {
                let period = spec.param_usize("period", 14);
                let values = atr::Atr::new(period).compute(bars);
                out.set_column(&format!("atr_{period}"), values);
            }
            "bollinger" => {
                let period = spec.param_usize("period", 20);
                let mult = spec.param_f64("multiplier", 2.0);
                out.set_column("bollinger_upper", bollinger::Bollinger::upper(period, mult).compute(bars));
                out.set_column("bollinger_middle", bollinger::Bollinger::middle(period, mult).compute(bars));
                out.set_column("bollinger_lower", bollinger::Bollinger::lower(period, mult).compute(bars));
            }
            "macd" => {
                let fast = spec.param_usize("fast", 12);
                let slow = spec.param_usize("slow", 26);
                let signal = spec.param_usize("signal", 9);
                let computed = macd::Macd::new(fast, slow, signal).compute_all(bars);
                out.set_column("macd", computed.macd);
                out.set_column("macd_signal", computed.signal);
                out.set_column("macd_hist", computed.histogram);
            }
            other => {
                return Err(IndicatorError::new(
                    &spec.name,
                    format!("unknown indicator `{other}`"),
                ))
            }
        }

        Ok(out)
    }
}

/// Parameter bag helper shared by the concrete indicator constructors above.
pub type Params = BTreeMap<String, crate::types::Scalar>;

/// Create synthetic bars from close prices for testing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{TimeZone, Utc};
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::IndicatorSource;

    #[test]
    fn registry_lists_builtins() {
        let reg = IndicatorRegistry::new();
        assert!(reg.list().contains(&"macd"));
    }

    #[test]
    fn registry_rejects_unknown_indicator() {
        let reg = IndicatorRegistry::new();
        let frame = MarketFrame::from_bars(make_bars(&[1.0, 2.0, 3.0]));
        let spec = IndicatorSpec::custom("not_a_real_indicator");
        let err = reg.compute(&frame, &spec).unwrap_err();
        assert_eq!(err.name, "not_a_real_indicator");
    }

    #[test]
    fn registry_computes_macd_columns() {
        let reg = IndicatorRegistry::new();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.3).collect();
        let frame = MarketFrame::from_bars(make_bars(&closes));
        let spec = IndicatorSpec::custom("macd");
        let out = reg.compute(&frame, &spec).unwrap();
        assert!(out.has_column("macd"));
        assert!(out.has_column("macd_signal"));
        assert!(out.has_column("macd_hist"));
    }

    #[test]
    fn registry_preloaded_validates_presence() {
        let reg = IndicatorRegistry::new();
        let mut frame = MarketFrame::from_bars(make_bars(&[1.0, 2.0, 3.0]));
        frame.set_column("FICT", vec![1.0, 2.0, 3.0]);
        let spec = IndicatorSpec {
            source: IndicatorSource::Preloaded,
            name: "fictional".into(),
            params: {
                let mut p = BTreeMap::new();
                p.insert("columns".into(), "FICT".into());
                p
            },
        };
        assert!(reg.compute(&frame, &spec).is_ok());

        let bad_spec = IndicatorSpec {
            source: IndicatorSource::Preloaded,
            name: "fictional".into(),
            params: {
                let mut p = BTreeMap::new();
                p.insert("columns".into(), "MISSING".into());
                p
            },
        };
        assert!(reg.compute(&frame, &bad_spec).is_err());
    }
}
