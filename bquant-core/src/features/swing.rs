//! Swing feature strategy (§4.3.1): pivot detection plus derived metrics.
//!
//! Three interchangeable pivot-detection families produce the same
//! `Vec<SwingPoint>` shape, so the metrics computation downstream never
//! branches on which algorithm ran. The pipeline decides `per_zone` vs.
//! `global` scope (§4.4 step 4); this module only ever sees the bar slice
//! and pivot series it is handed.

use crate::spec::{SwingAlgorithm, SwingSpec};
use crate::types::{Bar, Scalar, SwingPoint, SwingType};

/// Finds swing points over `bars` using `spec`'s algorithm and thresholds.
/// `atr_pct` is the parent frame's ATR expressed as a fraction of price,
/// used to scale `deviation_pct`/`min_amplitude_pct` when `auto_thresholds`
/// is enabled; ignored otherwise.
pub fn find_swings(bars: &[Bar], spec: &SwingSpec, atr_pct: Option<f64>) -> Vec<SwingPoint> {
    let (deviation_pct, min_amplitude_pct) = if spec.auto_thresholds {
        match atr_pct {
            Some(a) if a.is_finite() && a > 0.0 => (a * 2.0, a),
            _ => (spec.deviation_pct, spec.min_amplitude_pct),
        }
    } else {
        (spec.deviation_pct, spec.min_amplitude_pct)
    };

    match spec.algorithm {
        SwingAlgorithm::FindPeaks => find_peaks(bars, min_amplitude_pct),
        SwingAlgorithm::PivotPoints => pivot_points(bars, spec.min_legs.max(1)),
        SwingAlgorithm::ZigZag => zigzag(bars, deviation_pct, spec.min_legs),
    }
}

/// Local extrema on `close`: a bar is a peak/trough if the immediate
/// neighbors on both sides move the opposite way and the total move since
/// the last confirmed pivot is at least `min_amplitude_pct` of the pivot's
/// price.
fn find_peaks(bars: &[Bar], min_amplitude_pct: f64) -> Vec<SwingPoint> {
    if bars.len() < 3 {
        return vec![];
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut points = Vec::new();
    let mut point_id = 0usize;
    let mut last_pivot_price = closes[0];

    for i in 1..closes.len() - 1 {
        let is_local_max = closes[i] > closes[i - 1] && closes[i] >= closes[i + 1];
        let is_local_min = closes[i] < closes[i - 1] && closes[i] <= closes[i + 1];
        if !is_local_max && !is_local_min {
            continue;
        }
        let amplitude = (closes[i] - last_pivot_price).abs() / last_pivot_price.max(1e-12);
        if amplitude < min_amplitude_pct {
            continue;
        }
        let swing_type = if is_local_max { SwingType::Peak } else { SwingType::Trough };
        if let Some(prev) = points.last_mut() {
            finalize_amplitude(prev, closes[i]);
        }
        points.push(SwingPoint {
            index: i,
            timestamp: bars[i].timestamp,
            price: closes[i],
            swing_type,
            point_id,
            amplitude_to_next: None,
        });
        point_id += 1;
        last_pivot_price = closes[i];
    }
    enforce_alternation(points)
}

/// Classical pivot detection: a bar is a pivot-high iff its `high` exceeds
/// every `high` within `±k` bars (pivot-low symmetric on `low`).
fn pivot_points(bars: &[Bar], k: usize) -> Vec<SwingPoint> {
    let n = bars.len();
    if n < 2 * k + 1 {
        return vec![];
    }
    let mut points = Vec::new();
    let mut point_id = 0usize;
    for i in k..n - k {
        let window_high = &bars[i - k..=i + k];
        let is_high = window_high.iter().enumerate().all(|(j, b)| j == k || bars[i].high > b.high);
        let window_low = &bars[i - k..=i + k];
        let is_low = window_low.iter().enumerate().all(|(j, b)| j == k || bars[i].low < b.low);
        if is_high {
            points.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].high,
                swing_type: SwingType::Peak,
                point_id,
                amplitude_to_next: None,
            });
            point_id += 1;
        } else if is_low {
            points.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].low,
                swing_type: SwingType::Trough,
                point_id,
                amplitude_to_next: None,
            });
            point_id += 1;
        }
    }
    enforce_alternation(points)
}

/// Deviation-threshold filter: a new pivot confirms only once price moves
/// `deviation_pct` against the running extreme and at least `min_legs` bars
/// have elapsed since the previous confirmed pivot.
fn zigzag(bars: &[Bar], deviation_pct: f64, min_legs: usize) -> Vec<SwingPoint> {
    if bars.is_empty() {
        return vec![];
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut points: Vec<SwingPoint> = Vec::new();
    let mut point_id = 0usize;

    let mut trend_up: Option<bool> = None;
    let mut extreme_idx = 0usize;
    let mut extreme_price = closes[0];
    let mut last_confirmed_idx = 0usize;

    for i in 1..closes.len() {
        let price = closes[i];
        match trend_up {
            None => {
                if (price - extreme_price).abs() / extreme_price.max(1e-12) >= deviation_pct {
                    trend_up = Some(price > extreme_price);
                    extreme_idx = i;
                    extreme_price = price;
                } else if price > extreme_price {
                    extreme_price = price;
                    extreme_idx = i;
                } else if price < extreme_price {
                    extreme_price = price;
                    extreme_idx = i;
                }
            }
            Some(up) => {
                let extended = if up { price > extreme_price } else { price < extreme_price };
                if extended {
                    extreme_price = price;
                    extreme_idx = i;
                } else {
                    let retrace = (extreme_price - price).abs() / extreme_price.max(1e-12);
                    let legs_elapsed = extreme_idx.saturating_sub(last_confirmed_idx) >= min_legs;
                    if retrace >= deviation_pct && legs_elapsed {
                        let swing_type = if up { SwingType::Peak } else { SwingType::Trough };
                        points.push(SwingPoint {
                            index: extreme_idx,
                            timestamp: bars[extreme_idx].timestamp,
                            price: extreme_price,
                            swing_type,
                            point_id,
                            amplitude_to_next: None,
                        });
                        point_id += 1;
                        last_confirmed_idx = extreme_idx;
                        trend_up = Some(!up);
                        extreme_price = price;
                        extreme_idx = i;
                    }
                }
            }
        }
    }
    enforce_alternation(points)
}

/// Fills in `amplitude_to_next` and drops any pivot that would break strict
/// peak/trough alternation (keeping the more extreme of two same-typed runs).
fn enforce_alternation(points: Vec<SwingPoint>) -> Vec<SwingPoint> {
    let mut out: Vec<SwingPoint> = Vec::with_capacity(points.len());
    for p in points {
        if let Some(last) = out.last() {
            if last.swing_type == p.swing_type {
                let keep_new = match p.swing_type {
                    SwingType::Peak => p.price > last.price,
                    SwingType::Trough => p.price < last.price,
                };
                if keep_new {
                    out.pop();
                } else {
                    continue;
                }
            }
        }
        out.push(p);
    }
    for i in 0..out.len().saturating_sub(1) {
        let next_price = out[i + 1].price;
        finalize_amplitude(&mut out[i], next_price);
    }
    out
}

fn finalize_amplitude(point: &mut SwingPoint, next_price: f64) {
    point.amplitude_to_next = Some((next_price - point.price) / point.price.max(1e-12));
}

/// Slices a globally-computed pivot series down to the pivots that fall
/// within `[start_idx, end_idx)`, used when `scope=global` (§4.3.1).
pub fn attribute_to_zone(global: &[SwingPoint], start_idx: usize, end_idx: usize) -> Vec<SwingPoint> {
    global
        .iter()
        .filter(|p| p.index >= start_idx && p.index < end_idx)
        .cloned()
        .collect()
}

/// The headline numeric outputs for the swing strategy (§4.3.1).
#[derive(Debug, Clone, Default)]
pub struct SwingMetrics {
    pub num_swings: usize,
    pub rally_count: usize,
    pub drop_count: usize,
    pub avg_rally_pct: f64,
    pub avg_drop_pct: f64,
    pub max_rally_pct: f64,
    pub max_drop_pct: f64,
    pub avg_rally_duration_bars: f64,
    pub avg_drop_duration_bars: f64,
    pub avg_rally_speed_pct_per_bar: f64,
    pub avg_drop_speed_pct_per_bar: f64,
    pub rally_to_drop_ratio: f64,
    pub duration_symmetry: f64,
}

/// Computes swing metrics from a pivot sequence already attributed to a
/// zone. A "rally" is trough→peak, a "drop" is peak→trough.
pub fn compute_swing_metrics(points: &[SwingPoint]) -> SwingMetrics {
    let mut m = SwingMetrics { num_swings: points.len(), ..Default::default() };
    if points.len() < 2 {
        return m;
    }

    let mut rally_pcts = Vec::new();
    let mut drop_pcts = Vec::new();
    let mut rally_durations = Vec::new();
    let mut drop_durations = Vec::new();

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let pct = (b.price - a.price) / a.price.max(1e-12);
        let duration = (b.index - a.index).max(1) as f64;
        match a.swing_type {
            SwingType::Trough => {
                rally_pcts.push(pct);
                rally_durations.push(duration);
            }
            SwingType::Peak => {
                drop_pcts.push(pct.abs());
                drop_durations.push(duration);
            }
        }
    }

    m.rally_count = rally_pcts.len();
    m.drop_count = drop_pcts.len();
    m.avg_rally_pct = avg(&rally_pcts);
    m.avg_drop_pct = avg(&drop_pcts);
    m.max_rally_pct = rally_pcts.iter().cloned().fold(0.0_f64, f64::max);
    m.max_drop_pct = drop_pcts.iter().cloned().fold(0.0_f64, f64::max);
    m.avg_rally_duration_bars = avg(&rally_durations);
    m.avg_drop_duration_bars = avg(&drop_durations);
    m.avg_rally_speed_pct_per_bar = speed(&rally_pcts, &rally_durations);
    m.avg_drop_speed_pct_per_bar = speed(&drop_pcts, &drop_durations);
    m.rally_to_drop_ratio = if m.drop_count > 0 {
        m.rally_count as f64 / m.drop_count as f64
    } else if m.rally_count > 0 {
        f64::INFINITY
    } else {
        0.0
    };
    m.duration_symmetry = if m.avg_rally_duration_bars + m.avg_drop_duration_bars > 0.0 {
        1.0 - (m.avg_rally_duration_bars - m.avg_drop_duration_bars).abs()
            / (m.avg_rally_duration_bars + m.avg_drop_duration_bars)
    } else {
        1.0
    };

    m
}

fn avg(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn speed(pcts: &[f64], durations: &[f64]) -> f64 {
    if pcts.is_empty() {
        return 0.0;
    }
    let total_pct: f64 = pcts.iter().sum();
    let total_dur: f64 = durations.iter().sum();
    if total_dur > 0.0 {
        total_pct / total_dur
    } else {
        0.0
    }
}

impl SwingMetrics {
    pub fn into_scalars(self) -> Vec<(&'static str, Scalar)> {
        vec![
            ("num_swings", Scalar::Int(self.num_swings as i64)),
            ("rally_count", Scalar::Int(self.rally_count as i64)),
            ("drop_count", Scalar::Int(self.drop_count as i64)),
            ("avg_rally_pct", Scalar::Float(self.avg_rally_pct)),
            ("avg_drop_pct", Scalar::Float(self.avg_drop_pct)),
            ("max_rally_pct", Scalar::Float(self.max_rally_pct)),
            ("max_drop_pct", Scalar::Float(self.max_drop_pct)),
            ("avg_rally_duration_bars", Scalar::Float(self.avg_rally_duration_bars)),
            ("avg_drop_duration_bars", Scalar::Float(self.avg_drop_duration_bars)),
            ("avg_rally_speed_pct_per_bar", Scalar::Float(self.avg_rally_speed_pct_per_bar)),
            ("avg_drop_speed_pct_per_bar", Scalar::Float(self.avg_drop_speed_pct_per_bar)),
            ("rally_to_drop_ratio", Scalar::Float(self.rally_to_drop_ratio)),
            ("duration_symmetry", Scalar::Float(self.duration_symmetry)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn zigzag_finds_alternating_pivots_on_sawtooth() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + 10.0 * ((i % 10) as f64 - 5.0).abs())
            .collect();
        let bars = make_bars(&closes);
        let spec = SwingSpec {
            algorithm: SwingAlgorithm::ZigZag,
            deviation_pct: 0.03,
            min_legs: 1,
            ..SwingSpec::default()
        };
        let points = find_swings(&bars, &spec, None);
        for pair in points.windows(2) {
            assert_ne!(pair[0].swing_type, pair[1].swing_type);
        }
    }

    #[test]
    fn pivot_points_requires_strict_local_extreme() {
        let closes = vec![100.0, 101.0, 105.0, 101.0, 100.0, 99.0, 95.0, 99.0, 100.0];
        let bars = make_bars(&closes);
        let spec = SwingSpec { algorithm: SwingAlgorithm::PivotPoints, min_legs: 2, ..SwingSpec::default() };
        let points = find_swings(&bars, &spec, None);
        assert!(!points.is_empty());
    }

    #[test]
    fn attribute_to_zone_filters_by_index_range() {
        let points = vec![
            SwingPoint { index: 2, timestamp: make_bars(&[1.0])[0].timestamp, price: 1.0, swing_type: SwingType::Peak, point_id: 0, amplitude_to_next: None },
            SwingPoint { index: 20, timestamp: make_bars(&[1.0])[0].timestamp, price: 1.0, swing_type: SwingType::Trough, point_id: 1, amplitude_to_next: None },
        ];
        let sliced = attribute_to_zone(&points, 0, 10);
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced[0].index, 2);
    }

    #[test]
    fn empty_or_single_pivot_yields_zero_swings() {
        let m = compute_swing_metrics(&[]);
        assert_eq!(m.num_swings, 0);
    }
}
