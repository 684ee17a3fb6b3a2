//! Moving Average Convergence Divergence (MACD).
//!
//! `macd = ema(close, fast) - ema(close, slow)`, `macd_signal = ema(macd, signal)`,
//! `macd_hist = macd - macd_signal`. Built from [`ema::ema_of_series`] rather
//! than duplicating the EMA recursion.

use crate::indicators::ema::ema_of_series;
use crate::types::Bar;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

pub struct MacdColumns {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "MACD fast period must be shorter than slow period");
        Self { fast, slow, signal }
    }

    pub fn compute_all(&self, bars: &[Bar]) -> MacdColumns {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast_ema = ema_of_series(&closes, self.fast);
        let slow_ema = ema_of_series(&closes, self.slow);

        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal = ema_of_series(&macd, self.signal);

        let histogram: Vec<f64> = macd
            .iter()
            .zip(signal.iter())
            .map(|(m, s)| m - s)
            .collect();

        MacdColumns { macd, signal, histogram }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn macd_histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.1).sin() * 5.0 + i as f64 * 0.05).collect();
        let bars = make_bars(&closes);
        let macd = Macd::new(12, 26, 9).compute_all(&bars);
        for i in 0..macd.macd.len() {
            if macd.macd[i].is_nan() || macd.signal[i].is_nan() {
                continue;
            }
            let expected = macd.macd[i] - macd.signal[i];
            assert!((macd.histogram[i] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn macd_eventually_produces_finite_values() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 0.2).collect();
        let bars = make_bars(&closes);
        let macd = Macd::new(12, 26, 9).compute_all(&bars);
        assert!(macd.histogram[99].is_finite());
    }

    #[test]
    #[should_panic(expected = "fast period must be shorter")]
    fn macd_rejects_inverted_periods() {
        Macd::new(26, 12, 9);
    }
}
