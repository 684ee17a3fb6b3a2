//! The OHLCV frame: a time-indexed table of bars plus appended named columns.
//!
//! Modeled as `Vec<Bar>` plus a side table of `Vec<f64>` columns rather than a
//! DataFrame type, matching this pipeline's hot paths, which read whole
//! columns or contiguous zone slices rather than doing relational joins.

use std::collections::BTreeMap;

use crate::error::InputError;
use crate::types::Bar;

#[derive(Debug, Clone, Default)]
pub struct MarketFrame {
    bars: Vec<Bar>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl MarketFrame {
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        Self { bars, columns: BTreeMap::new() }
    }

    /// Validates the input frame contract (§6.1): non-empty, strictly
    /// increasing timestamps, finite OHLC.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.bars.is_empty() {
            return Err(InputError::EmptyFrame);
        }
        for i in 1..self.bars.len() {
            if self.bars[i].timestamp <= self.bars[i - 1].timestamp {
                return Err(InputError::NonMonotonicIndex(i));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn slice(&self, start_idx: usize, end_idx: usize) -> &[Bar] {
        &self.bars[start_idx..end_idx]
    }

    pub fn close(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn high(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn low(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volume(&self) -> Option<Vec<f64>> {
        if self.bars.iter().all(|b| b.has_volume()) {
            Some(self.bars.iter().map(|b| b.volume).collect())
        } else {
            None
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        match name {
            "open" | "high" | "low" | "close" | "volume" => true,
            other => self.columns.contains_key(other),
        }
    }

    /// Appends (or overwrites) a named column. `values.len()` must equal the
    /// frame's row count.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.bars.len(), "column length must match frame length");
        self.columns.insert(name.to_string(), values);
    }

    /// Reads a column by name, including the builtin OHLC/volume columns.
    /// Returns an owned `Vec` since the builtin columns are materialized
    /// on demand from `Bar` fields.
    pub fn column_owned(&self, name: &str) -> Option<Vec<f64>> {
        match name {
            "open" => Some(self.bars.iter().map(|b| b.open).collect()),
            "high" => Some(self.high()),
            "low" => Some(self.low()),
            "close" => Some(self.close()),
            "volume" => self.volume(),
            other => self.columns.get(other).cloned(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Reads a `[start, end)` slice of a named column, including builtins.
    /// Used by feature strategies to read an indicator column restricted to
    /// a zone's span without materializing the whole column first.
    pub fn column_slice(&self, name: &str, start: usize, end: usize) -> Option<Vec<f64>> {
        self.column_owned(name).map(|col| col[start..end].to_vec())
    }

    /// A deterministic content hash of the bars and appended columns, used
    /// alongside `PipelineSpec::fingerprint()` as the pipeline's optional
    /// result-cache key (§4.4, §10.4).
    pub fn content_fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for bar in &self.bars {
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
            hasher.update(&bar.timestamp.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        }
        for (name, values) in &self.columns {
            hasher.update(name.as_bytes());
            for v in values {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
