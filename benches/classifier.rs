//! Performance benchmarks for DTMF detection

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use redfire_dtmf::protocols::dtmf::{goertzel, DtmfClassifier, Keypad, SequenceDecoder, ToneSynthesizer};

fn bench_goertzel(c: &mut Criterion) {
    let window = ToneSynthesizer::new(8000, 16, Keypad::Numeric)
        .synthesize('5', 800)
        .unwrap();

    c.bench_function("goertzel_800", |b| {
        b.iter(|| goertzel(black_box(&window), black_box(8000), black_box(770)));
    });
}

fn bench_classify(c: &mut Criterion) {
    let window = ToneSynthesizer::new(44100, 16, Keypad::Numeric)
        .synthesize('8', 4410)
        .unwrap();
    let classifier = DtmfClassifier::default();

    c.bench_function("classify_4410", |b| {
        b.iter(|| classifier.classify(black_box(&window), black_box(44100)));
    });
}

fn bench_decode(c: &mut Criterion) {
    // 10 seconds, 8 channels at 48kHz
    let synth = ToneSynthesizer::new(48000, 16, Keypad::Numeric);
    let channels: Vec<_> = "12345678"
        .chars()
        .map(|key| synth.synthesize(key, 48000 * 10).unwrap())
        .collect();
    let decoder = SequenceDecoder::default();

    c.bench_function("decode_8ch_10s", |b| {
        b.iter(|| {
            let matrix = decoder.decode(black_box(&channels), 48000);
            decoder.merge(&matrix)
        });
    });
}

criterion_group!(benches, bench_goertzel, bench_classify, bench_decode);
criterion_main!(benches);
