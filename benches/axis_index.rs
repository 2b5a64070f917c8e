//! Benchmarks for axis hit-testing and cell cache reads.
//!
//! Run with: cargo bench
//!
//! Results are saved to `target/criterion/` with HTML reports.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sparsegrid::{AxisIndex, CellRange, CellValueCache, HighWaterMark, MemoryStore};

/// Rows with every `stride`-th height overridden.
fn rows_with_overrides(stride: u32) -> AxisIndex {
    let mut rows = AxisIndex::new(50_000, 23.0);
    if stride > 0 {
        for row in (0..50_000).step_by(stride as usize) {
            rows.set_size(row, 23.0 + f64::from(row % 40));
        }
    }
    rows
}

fn bench_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("position");
    for stride in [0_u32, 1000, 10] {
        let mut rows = rows_with_overrides(stride);
        group.bench_with_input(BenchmarkId::from_parameter(stride), &stride, |b, _| {
            b.iter(|| rows.position(black_box(49_999), 30.0));
        });
    }
    group.finish();
}

fn bench_index_at(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_at");
    for stride in [0_u32, 1000, 10] {
        let mut rows = rows_with_overrides(stride);
        let end = rows.position(rows.total(), 30.0);
        group.bench_with_input(BenchmarkId::from_parameter(stride), &stride, |b, _| {
            b.iter(|| rows.index_at(black_box(end * 0.73), 30.0));
        });
    }
    group.finish();
}

/// Painting a fully cached 40x20 viewport.
fn bench_visible_sync(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let cache = CellValueCache::new(Rc::new(MemoryStore::open()), HighWaterMark::new(100, 100));
    let range = CellRange::new(0, 39, 0, 19);
    runtime.block_on(async {
        for cell in range.coords().step_by(3) {
            cache
                .set(cell.row, cell.col, format!("{}", cell.row * cell.col))
                .await
                .unwrap();
        }
        cache.prefetch_range(range).await.unwrap();
    });

    c.bench_function("visible_sync_40x20", |b| {
        b.iter(|| cache.visible_sync(black_box(range)));
    });
}

criterion_group!(benches, bench_position, bench_index_at, bench_visible_sync);
criterion_main!(benches);
