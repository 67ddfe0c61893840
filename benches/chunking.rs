use answerdesk::embeddings::chunking::{ChunkingConfig, chunk_text};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn build_document(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Section {} of the support handbook covers billing, refunds, and data exports. \
                 Tickets are answered within one business day. Escalations reach an on-call \
                 engineer when automated answers score below the configured threshold.",
                i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = build_document(200);
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&document), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
