use std::convert::Infallible;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chunkmap::{parallel_map, ParallelConfig};

const ITEMS: u64 = 20_000;

/// A few hundred nanoseconds of integer work per item
fn mix(x: u64) -> Result<u64, Infallible> {
    let mut h = x ^ 0x9E37_79B9_7F4A_7C15;
    for _ in 0..64 {
        h = h.rotate_left(5).wrapping_mul(0x100_0000_01B3) ^ x;
    }
    Ok(h)
}

fn drain(config: ParallelConfig) -> u64 {
    parallel_map(mix, 0..ITEMS, config)
        .expect("valid config")
        .map(|r| r.expect("no faults").unwrap_or(0))
        .fold(0u64, u64::wrapping_add)
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_size");
    group.throughput(Throughput::Elements(ITEMS));
    for chunk_size in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &size| {
            b.iter(|| {
                let config = ParallelConfig::default().with_chunk_size(size);
                black_box(drain(config));
            });
        });
    }
    group.finish();
}

fn bench_ordered_vs_unordered(c: &mut Criterion) {
    let mut group = c.benchmark_group("delivery");
    group.throughput(Throughput::Elements(ITEMS));
    for (name, unordered) in [("ordered", false), ("unordered", true)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let config = ParallelConfig::default()
                    .with_chunk_size(64)
                    .with_unordered(unordered);
                black_box(drain(config));
            });
        });
    }
    group.finish();
}

fn bench_sequential_baseline(c: &mut Criterion) {
    c.bench_function("sequential_baseline", |b| {
        b.iter(|| {
            let total = (0..ITEMS)
                .map(|x| mix(x).unwrap_or(0))
                .fold(0u64, u64::wrapping_add);
            black_box(total);
        });
    });
}

criterion_group!(
    benches,
    bench_chunk_sizes,
    bench_ordered_vs_unordered,
    bench_sequential_baseline
);
criterion_main!(benches);
