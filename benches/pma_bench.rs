//! Benchmarks for the four workloads the density thresholds are tuned
//! against (§9 S6, §5.6): sequential insert, random insert, range scan, and
//! a Zipfian hotspot insert pattern that stresses the adaptive partition
//! path instead of the uniform one.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use apma::{Pma, PmaConfig};

fn sequential_insert(c: &mut Criterion) {
    c.bench_function("sequential_insert_100k", |b| {
        b.iter_batched(
            Pma::new,
            |mut pma| {
                for k in 0..100_000 {
                    pma.insert(k, k).unwrap();
                }
                black_box(pma.len());
            },
            BatchSize::LargeInput,
        );
    });
}

fn random_insert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x2545F4914F6CDD1D);
    let keys: Vec<i64> = (0..100_000).map(|_| rng.random_range(0..1_000_000)).collect();
    c.bench_function("random_insert_100k", |b| {
        b.iter_batched(
            Pma::new,
            |mut pma| {
                for &k in &keys {
                    pma.insert(k, k).unwrap();
                }
                black_box(pma.len());
            },
            BatchSize::LargeInput,
        );
    });
}

fn range_scan(c: &mut Criterion) {
    let mut pma = Pma::new();
    for k in 0..1_000_000 {
        pma.insert(k, k).unwrap();
    }
    c.bench_function("range_scan_10k_window", |b| {
        b.iter(|| black_box(pma.range(400_000, 410_000)));
    });
}

/// Zipfian-flavoured hotspot: most inserts land in a narrow band, a few
/// land far outside it, the way a time-ordered key with occasional
/// backfills behaves.
fn hotspot_insert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x9E3779B97F4A7C15);
    let mut keys = Vec::with_capacity(100_000);
    for i in 0..100_000i64 {
        let hot = rng.random_range(0..100) < 90;
        let key = if hot { 500_000 + rng.random_range(0..2_000) } else { rng.random_range(0..2_000_000) };
        keys.push((key, i));
    }
    c.bench_function("hotspot_insert_100k", |b| {
        b.iter_batched(
            || (Pma::with_config(PmaConfig { segment_capacity: 64, ..PmaConfig::default() }).unwrap(), keys.clone()),
            |(mut pma, keys)| {
                for (k, v) in keys {
                    let _ = pma.insert(k, v);
                }
                black_box(pma.len());
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, sequential_insert, random_insert, range_scan, hotspot_insert);
criterion_main!(benches);
