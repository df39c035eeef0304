use criterion::{criterion_group, criterion_main, Criterion};
use searchcore::tokenizer::tokenize;

const TEXT: &str = "An inverted index maps every stemmed term to the sorted list of documents \
    that contain it, together with the token positions of each occurrence. Boolean queries \
    are answered by merging those lists; phrase queries additionally compare positions.";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(50);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
