use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use video_transcriber::correction::{count_changed_words, LexiconCorrector, WordFrequencies};
use video_transcriber::TextCorrector;

const SAMPLE_TRANSCRIPT: &str = "so today I am gong to show you how the proces works \
    first we upload the vidio then the audio is extracted and sent to the servise \
    after that we corect the text and you can downlod the file tommorow";

/// Benchmark single-word suggestions (edit distance 1 and 2)
fn bench_suggest(c: &mut Criterion) {
    let corrector = LexiconCorrector::new();

    let mut group = c.benchmark_group("lexicon_suggest");
    for word in ["gong", "tommorow", "xqzvw"] {
        group.bench_with_input(BenchmarkId::from_parameter(word), &word, |b, word| {
            b.iter(|| corrector.suggest(black_box(word)))
        });
    }
    group.finish();
}

/// Benchmark full transcript correction at growing lengths
fn bench_correct_text(c: &mut Criterion) {
    let corrector = LexiconCorrector::new();

    let mut group = c.benchmark_group("lexicon_correct_text");
    for repeats in [1usize, 10, 50] {
        let text = vec![SAMPLE_TRANSCRIPT; repeats].join(" ");
        group.bench_with_input(BenchmarkId::from_parameter(repeats), &text, |b, text| {
            b.iter(|| corrector.correct_text(black_box(text)))
        });
    }
    group.finish();
}

/// Benchmark the async corrector entry point used by the pipeline
fn bench_text_corrector(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let corrector = LexiconCorrector::new();

    c.bench_function("text_corrector_correct", |b| {
        b.iter(|| rt.block_on(async { corrector.correct(black_box(SAMPLE_TRANSCRIPT)).await }))
    });
}

fn bench_word_list(c: &mut Criterion) {
    c.bench_function("embedded_word_list_load", |b| b.iter(WordFrequencies::embedded));

    let corrected = LexiconCorrector::new().correct_text(SAMPLE_TRANSCRIPT);
    c.bench_function("count_changed_words", |b| {
        b.iter(|| count_changed_words(black_box(SAMPLE_TRANSCRIPT), black_box(&corrected)))
    });
}

criterion_group!(
    benches,
    bench_suggest,
    bench_correct_text,
    bench_text_corrector,
    bench_word_list
);
criterion_main!(benches);
