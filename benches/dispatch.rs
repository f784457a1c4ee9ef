//! Benchmarks for region dispatch and failure propagation:
//! - Entering and leaving an empty region (the protocol floor)
//! - A throw absorbed by a catch in the same region
//! - A throw crossing several handlerless regions

use std::cell::Cell;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use exstack::{TraceEntry, TryBlock};

/// Benchmark the bare enter/resume/leave cycle with a trivial body.
fn bench_empty_region(c: &mut Criterion) {
    c.bench_function("region_empty", |b| {
        b.iter(|| {
            TryBlock::new(|| black_box(())).run();
        });
    });
}

/// Benchmark a throw caught in the same region, including the trace
/// record and the unwind back to the resume point.
fn bench_throw_caught_locally(c: &mut Criterion) {
    c.bench_function("throw_caught_locally", |b| {
        let hits = Cell::new(0u64);
        b.iter(|| {
            TryBlock::new(|| {
                exstack::throw(TraceEntry::new(7).at("bench", 1).message("bench failure"))
            })
            .catch(7, || hits.set(hits.get() + 1))
            .run();
        });
        black_box(hits.get());
    });
}

/// Benchmark a throw that auto-rethrows through 8 handlerless regions
/// before a catchall absorbs it.
fn bench_throw_through_nested_regions(c: &mut Criterion) {
    fn nest(depth: usize) {
        if depth == 0 {
            exstack::throw!(3, "deep bench failure");
        }
        TryBlock::new(|| nest(depth - 1)).run();
    }

    c.bench_function("throw_through_8_regions", |b| {
        b.iter(|| {
            TryBlock::new(|| nest(black_box(8)))
                .catch_all(|| ())
                .run();
        });
    });
}

criterion_group!(
    benches,
    bench_empty_region,
    bench_throw_caught_locally,
    bench_throw_through_nested_regions
);
criterion_main!(benches);
