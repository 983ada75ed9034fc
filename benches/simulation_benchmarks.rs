//! Simulation Benchmarks with 95% Confidence Intervals
//!
//! Measures end-to-end simulation cost as the task set and horizon grow.
//!
//! Statistical rigor:
//! - Sample size: 100 iterations per benchmark
//! - Confidence intervals: 95% bootstrap CI
//!
//! Run with: cargo criterion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edfsim::engine::run_trials;
use edfsim::prelude::*;

fn task_set(n: u32) -> TaskSet {
    TaskSet::new(
        (0..n)
            .map(|i| {
                let period = 10 + u64::from(i) * 7;
                TaskSpec::new(i, 1 + u64::from(i % 3), period).with_probabilities(0.05, 0.9)
            })
            .collect(),
    )
}

fn config(timeout: u64) -> SimConfig {
    SimConfig::builder()
        .seed(42)
        .timeout(timeout)
        .max_reexec(2)
        .min_success(1)
        .build()
}

/// Full run over a fixed horizon, varying the number of tasks
fn bench_task_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("EDF_TaskCount");
    group.sample_size(100);
    group.confidence_level(0.95);

    for n in [2u32, 8, 32].iter() {
        let tasks = task_set(*n);
        let cfg = config(10_000);
        group.bench_with_input(BenchmarkId::new("run", n), n, |b, _| {
            b.iter(|| {
                let report = SimEngine::new(&cfg, &tasks)
                    .and_then(SimEngine::run)
                    .map(|r| r.events.len());
                black_box(report)
            });
        });
    }

    group.finish();
}

/// Full run with a fixed task set, varying the horizon
fn bench_horizon(c: &mut Criterion) {
    let mut group = c.benchmark_group("EDF_Horizon");
    group.sample_size(100);
    group.confidence_level(0.95);

    let tasks = task_set(8);
    for timeout in [1_000u64, 10_000, 100_000].iter() {
        let cfg = config(*timeout);
        group.bench_with_input(BenchmarkId::new("run", timeout), timeout, |b, _| {
            b.iter(|| {
                let report = SimEngine::new(&cfg, &tasks)
                    .and_then(SimEngine::run)
                    .map(|r| r.final_time);
                black_box(report)
            });
        });
    }

    group.finish();
}

/// Monte Carlo trials over partitioned RNG streams
fn bench_trials(c: &mut Criterion) {
    let mut group = c.benchmark_group("EDF_Trials");
    group.sample_size(20); // Fewer samples for longer benchmark
    group.confidence_level(0.95);

    let tasks = task_set(8);
    let cfg = config(2_000);
    for trials in [10usize, 50].iter() {
        group.bench_with_input(BenchmarkId::new("trials", trials), trials, |b, &n| {
            b.iter(|| black_box(run_trials(&cfg, &tasks, n).map(|s| s.schedulable_trials)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_task_count, bench_horizon, bench_trials);
criterion_main!(benches);
