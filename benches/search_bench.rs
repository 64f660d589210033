//! Benchmarks for brute-force vs VP-tree search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use libvecdb::flat_index::brute_force_knn;
use libvecdb::vptree::vptree_knn;
use libvecdb::{Candidate, Metric, Vector, VpTree};

fn create_candidates(n: usize, dim: usize) -> Vec<Candidate<usize>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let data: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            Candidate::new(Uuid::new_v4(), Vector::new(data), i)
        })
        .collect()
}

fn benchmark_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    let query = Vector::new(vec![0.5; 16]);

    for size in [100, 1000, 10000] {
        let candidates = create_candidates(size, 16);

        for metric in [Metric::L2, Metric::Cosine] {
            group.bench_with_input(
                BenchmarkId::new(format!("brute/{metric}"), size),
                &candidates,
                |b, candidates| {
                    b.iter(|| {
                        brute_force_knn(black_box(&query), candidates.clone(), 10, metric).unwrap()
                    });
                },
            );

            // Build plus search, which is what a query pays.
            group.bench_with_input(
                BenchmarkId::new(format!("vptree/{metric}"), size),
                &candidates,
                |b, candidates| {
                    b.iter(|| {
                        vptree_knn(black_box(&query), candidates.clone(), 10, metric, Some(7))
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_vptree_search_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("vptree_search");

    for size in [1000, 10000] {
        let tree = VpTree::build_seeded(create_candidates(size, 16), Metric::L2, 7).unwrap();
        let query = Vector::new(vec![0.1; 16]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| tree.search(black_box(&query), black_box(10)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_knn, benchmark_vptree_search_only);
criterion_main!(benches);
