use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use index::{AnnConfig, IndexConfig, VectorIndex};
use std::hint::black_box;

/// Deterministic pseudo-random vector; no RNG crate needed for a bench fixture.
fn synthetic_vector(seed: usize, dim: usize) -> Vec<f32> {
    (0..dim)
        .map(|i| ((seed * 31 + i * 17) as f32 * 0.618).sin())
        .collect()
}

fn corpus(size: usize, dim: usize) -> (Vec<Vec<f32>>, Vec<usize>) {
    let vectors = (0..size).map(|i| synthetic_vector(i, dim)).collect();
    (vectors, (0..size).collect())
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    let dim = 384;

    for size in [100, 1000, 5000] {
        let (vectors, ids) = corpus(size, dim);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("exact_{size}"), |b| {
            b.iter(|| {
                VectorIndex::build(
                    black_box(vectors.clone()),
                    black_box(ids.clone()),
                    &IndexConfig::default(),
                )
            });
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");
    let dim = 384;
    let query = synthetic_vector(999_999, dim);

    for size in [1000, 10_000] {
        let (vectors, ids) = corpus(size, dim);
        let exact = VectorIndex::build(vectors.clone(), ids.clone(), &IndexConfig::default())
            .expect("exact build");
        let ann_cfg = IndexConfig::new().with_ann(AnnConfig::default().with_enabled(true));
        let ann = VectorIndex::build(vectors, ids, &ann_cfg).expect("ann build");

        group.bench_function(format!("exact_top5_{size}"), |b| {
            b.iter(|| exact.search(black_box(&query), 5));
        });
        group.bench_function(format!("ann_top5_{size}"), |b| {
            b.iter(|| ann.search(black_box(&query), 5));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
