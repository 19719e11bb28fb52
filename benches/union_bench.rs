use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use junction::iterator::{ArrayIterator, NestedIterator, OrIterator};

/// Generate `branches` sorted candidate sets of `n` keys each, overlapping
/// enough that the union has to deduplicate.
fn generate_branch_values(branches: usize, n: usize) -> Vec<Vec<u64>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..branches)
        .map(|_| (0..n).map(|_| rng.gen_range(0..(n as u64 * 2))).collect())
        .collect()
}

fn build_union(sets: &[Vec<u64>]) -> OrIterator<u64> {
    let sources = sets
        .iter()
        .map(|values| {
            Box::new(ArrayIterator::new(values.clone())) as Box<dyn NestedIterator<u64>>
        })
        .collect();
    OrIterator::new(sources)
}

fn bench_union_drain(c: &mut Criterion) {
    let sets = generate_branch_values(4, 10_000);
    c.bench_function("union_drain", |b| {
        b.iter(|| {
            let mut union = build_union(&sets);
            union.initialize().unwrap();
            let mut count = 0usize;
            while let Some(_) = union.next().unwrap() {
                count += 1;
            }
            count
        });
    });
}

fn bench_union_move_to(c: &mut Criterion) {
    let sets = generate_branch_values(4, 10_000);
    let max = sets
        .iter()
        .flat_map(|set| set.iter().copied())
        .max()
        .unwrap_or(0);
    c.bench_function("union_move_to", |b| {
        b.iter(|| {
            let mut union = build_union(&sets);
            union.initialize().unwrap();
            // skip through the union in large strides
            let mut minimum = 0u64;
            let mut landed = 0usize;
            while minimum < max {
                minimum += 97;
                match union.move_to(&minimum).unwrap() {
                    Some(value) => {
                        landed += 1;
                        minimum = value;
                    }
                    None => break,
                }
            }
            landed
        });
    });
}

fn bench_nested_union_drain(c: &mut Criterion) {
    let sets = generate_branch_values(8, 5_000);
    c.bench_function("nested_union_drain", |b| {
        b.iter(|| {
            let inner_a = build_union(&sets[..4]);
            let inner_b = build_union(&sets[4..]);
            let mut root = OrIterator::new(vec![
                Box::new(inner_a) as Box<dyn NestedIterator<u64>>,
                Box::new(inner_b) as Box<dyn NestedIterator<u64>>,
            ]);
            root.initialize().unwrap();
            let mut count = 0usize;
            while let Some(_) = root.next().unwrap() {
                count += 1;
            }
            count
        });
    });
}

criterion_group!(
    benches,
    bench_union_drain,
    bench_union_move_to,
    bench_nested_union_drain
);
criterion_main!(benches);
