//! Criterion benchmarks for the universal zone-analysis pipeline's hot loops.
//!
//! Run with: `cargo bench -p bquant-core`
//!
//! These measure the paths most exposed to frame size: zero-crossing
//! detection, per-zone feature application, and the end-to-end `build()`
//! across a range of frame lengths.

use bquant_core::frame::MarketFrame;
use bquant_core::pipeline::ZoneAnalyzerBuilder;
use bquant_core::spec::{DetectionSpec, FeatureStrategySelection, SwingSpec};
use bquant_core::types::Bar;
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut close = 100.0;
    for i in 0..n {
        let open = close;
        close += (i as f64 * 0.17).sin() * 0.8;
        let high = open.max(close) + 0.5;
        let low = open.min(close) - 0.5;
        bars.push(Bar { timestamp: base + Duration::hours(i as i64), open, high, low, close, volume: 1000.0 });
    }
    bars
}

fn frame_with_oscillator(n: usize) -> MarketFrame {
    let bars = synthetic_bars(n);
    let oscillator: Vec<f64> = (0..n).map(|i| (4.0 * std::f64::consts::PI * i as f64 / n as f64).sin()).collect();
    let mut frame = MarketFrame::from_bars(bars);
    frame.set_column("FICT", oscillator);
    frame
}

fn bench_zero_crossing_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_crossing_detection");

    for size in [100, 1_000, 10_000].iter() {
        let frame = frame_with_oscillator(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let zones = bquant_core::detection::detect_zones(
                    black_box(&frame),
                    &DetectionSpec::ZeroCrossing {
                        indicator_col: "FICT".into(),
                        min_duration: None,
                        zone_types: vec![],
                    },
                )
                .unwrap();
                black_box(zones.len());
            });
        });
    }

    group.finish();
}

fn bench_full_pipeline_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_build");

    for size in [100, 1_000, 5_000].iter() {
        let frame = frame_with_oscillator(*size);
        let builder = ZoneAnalyzerBuilder::new()
            .detect_zones(DetectionSpec::ZeroCrossing {
                indicator_col: "FICT".into(),
                min_duration: None,
                zone_types: vec![],
            })
            .with_strategies(FeatureStrategySelection {
                swing: Some(SwingSpec::default()),
                shape: true,
                divergence: false,
                volume: true,
                volatility: true,
            });

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = builder.build(black_box(&frame)).unwrap();
                black_box(result.zones.len());
            });
        });
    }

    group.finish();
}

fn bench_clustered_pipeline_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_build_with_clustering");

    let frame = frame_with_oscillator(2_000);
    let builder = ZoneAnalyzerBuilder::new()
        .detect_zones(DetectionSpec::ZeroCrossing {
            indicator_col: "FICT".into(),
            min_duration: None,
            zone_types: vec![],
        })
        .with_strategies(FeatureStrategySelection { volatility: true, ..Default::default() })
        .analyze(true, Some(4))
        .with_seed(11);

    group.bench_function("2000_bars_k4", |b| {
        b.iter(|| {
            let result = builder.build(black_box(&frame)).unwrap();
            black_box(result.statistics.cluster_summary.is_some());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_zero_crossing_detection, bench_full_pipeline_build, bench_clustered_pipeline_build);
criterion_main!(benches);
