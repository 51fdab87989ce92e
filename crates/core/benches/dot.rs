//! Microbenchmarks for the sparse dot-product variants.
//!
//! Run with: `cargo bench -p docalign-core`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docalign_core::sparse::SparseVector;

/// Deterministic xorshift so runs are comparable.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

fn random_vector(rng: &mut XorShift, entries: usize, index_space: u64) -> SparseVector {
    let mut vector = SparseVector::with_capacity(entries);
    for _ in 0..entries {
        let index = rng.next() % index_space;
        *vector.insert(index) = (rng.next() % 1000) as f32 / 64.0;
    }
    vector.pad_for_simd();
    vector
}

fn bench_dot(c: &mut Criterion) {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

    // Comparable sizes: the linear merge path.
    let a = random_vector(&mut rng, 2_000, 1 << 20);
    let b = random_vector(&mut rng, 2_500, 1 << 20);

    // Skewed sizes: the galloping path.
    let small = random_vector(&mut rng, 64, 1 << 20);
    let large = random_vector(&mut rng, 50_000, 1 << 20);

    let mut group = c.benchmark_group("sparse_dot");
    group.bench_function("naive_balanced", |bench| {
        bench.iter(|| black_box(a.dot_naive(black_box(&b))))
    });
    group.bench_function("auto_balanced", |bench| {
        bench.iter(|| black_box(a.dot(black_box(&b))))
    });
    group.bench_function("search_skewed", |bench| {
        bench.iter(|| black_box(small.dot_search(black_box(&large))))
    });
    group.bench_function("auto_skewed", |bench| {
        bench.iter(|| black_box(small.dot(black_box(&large))))
    });
    group.finish();
}

criterion_group!(benches, bench_dot);
criterion_main!(benches);
