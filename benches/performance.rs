// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for emotransform
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Each emotion pass over melodies of growing length
//! - Key detection
//! - MusicXML and MIDI serialization of a transformed score

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use emotransform::score::midi::MidiExporter;
use emotransform::score::{musicxml, ql, Measure, MeasureElement, Note, Part, SourceFormat, TempoMarking};
use emotransform::{Emotion, EmotionTransformEngine, FixedKey, Key, KeyDetector, KrumhanslDetector, Pitch, Score};

/// Quarter-note melody over two octaves of C major, four notes per bar
fn melody(length: usize, seed: u64) -> Score {
    let scale = "C major".parse::<Key>().unwrap().scale();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut part = Part::new("P1", "Melody");
    for bar in 0..length.div_ceil(4) {
        let mut measure = Measure::new(bar as u32 + 1);
        if bar == 0 {
            measure.push(MeasureElement::Tempo {
                marking: TempoMarking::new(120.0),
                offset: ql(0),
            });
        }
        for beat in 0..4.min(length - bar * 4) {
            let reference = Pitch::from_midi_sharp(rng.gen_range(55..84));
            let degree = rng.gen_range(1..=7);
            let pitch = scale.pitch_at_degree(degree, &reference).unwrap_or(reference);
            let duration = ql(rng.gen_range(1..=2));
            measure.push(MeasureElement::Note(Note::new(pitch, duration, ql(beat as i64))));
        }
        part.measures.push(measure);
    }

    let mut score = Score::new(SourceFormat::MusicXml);
    score.parts.push(part);
    score
}

/// Benchmark each rule set (clone included so every iteration starts fresh)
fn bench_emotion_passes(c: &mut Criterion) {
    let mut group = c.benchmark_group("emotion_pass");
    let engine = EmotionTransformEngine::with_detector(FixedKey("C major".parse().unwrap()));

    for size in [64, 512, 4096].iter() {
        let score = melody(*size, 42);
        for emotion in Emotion::SUPPORTED {
            group.bench_with_input(BenchmarkId::new(emotion.label(), size), &score, |b, score| {
                b.iter_batched(
                    || score.clone(),
                    |mut score| black_box(engine.transform(&mut score, emotion).ok()),
                    BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

/// Benchmark key detection
fn bench_key_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_detection");

    for size in [64, 4096].iter() {
        let score = melody(*size, 7);
        group.bench_with_input(BenchmarkId::new("krumhansl", size), &score, |b, score| {
            b.iter(|| black_box(KrumhanslDetector.detect_key(score)))
        });
    }

    group.finish();
}

/// Benchmark writing a transformed score
fn bench_serialization(c: &mut Criterion) {
    let mut score = melody(512, 3);
    let engine = EmotionTransformEngine::new();
    let _ = engine.transform(&mut score, Emotion::Gratitude);

    c.bench_function("musicxml_write", |b| {
        b.iter(|| black_box(musicxml::write_string(&score).map(|s| s.len()).unwrap_or(0)))
    });

    c.bench_function("midi_export", |b| {
        b.iter(|| {
            black_box(
                MidiExporter::from_score(&score)
                    .export_to_bytes()
                    .map(|bytes| bytes.len())
                    .unwrap_or(0),
            )
        })
    });
}

criterion_group!(benches, bench_emotion_passes, bench_key_detection, bench_serialization);
criterion_main!(benches);
