use criterion::{black_box, criterion_group, criterion_main, Criterion};
use searchcore::merge::{and, and_not, or};
use searchcore::DocInfo;

fn postings(step: usize, len: usize) -> Vec<DocInfo> {
    (0..len).map(|i| DocInfo::new(format!("doc{:08}", i * step))).collect()
}

fn bench_merges(c: &mut Criterion) {
    let left = postings(2, 10_000);
    let right = postings(3, 10_000);
    c.bench_function("and_10k", |b| b.iter(|| and(black_box(&left), black_box(&right))));
    c.bench_function("or_10k", |b| b.iter(|| or(black_box(&left), black_box(&right))));
    c.bench_function("and_not_10k", |b| b.iter(|| and_not(black_box(&left), black_box(&right))));
}

criterion_group!(benches, bench_merges);
criterion_main!(benches);
