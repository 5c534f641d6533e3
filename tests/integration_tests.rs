// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for emotransform
//!
//! These tests drive the engine through the public API: scores are built in
//! memory or written to temporary files, transformed, and read back.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use emotransform::music::PitchName;
use emotransform::score::midi::MidiExporter;
use emotransform::score::{
    musicxml, ql, ql_frac, Measure, MeasureElement, Note, Part, QuarterLength, SourceFormat, TempoMarking,
};
use emotransform::{
    Emotion, EmotionError, EmotionTransformEngine, FixedKey, Key, KrumhanslDetector, Pitch, Score,
};

fn pitch(name: &str) -> Pitch {
    let (letters, octave) = name.split_at(name.len() - 1);
    letters
        .parse::<PitchName>()
        .unwrap()
        .in_octave(octave.parse().unwrap())
}

fn c_major() -> Key {
    "C major".parse().unwrap()
}

fn c_major_engine() -> EmotionTransformEngine<FixedKey> {
    EmotionTransformEngine::with_detector(FixedKey(c_major()))
}

/// Lay notes out in 4/4 bars, starting a new bar when a note would cross the barline
fn score_from(notes: &[(Pitch, QuarterLength)], tempo: Option<f64>, source: SourceFormat) -> Score {
    let mut part = Part::new("P1", "Melody");
    let mut measure = Measure::new(1);
    measure.attributes.time = Some(Default::default());
    if let Some(bpm) = tempo {
        measure.push(MeasureElement::Tempo {
            marking: TempoMarking::new(bpm),
            offset: ql(0),
        });
    }

    let mut offset = ql(0);
    for &(p, duration) in notes {
        if offset > ql(0) && offset + duration > ql(4) {
            let number = measure.number + 1;
            part.measures.push(std::mem::replace(&mut measure, Measure::new(number)));
            offset = ql(0);
        }
        measure.push(MeasureElement::Note(Note::new(p, duration, offset)));
        offset += duration;
    }
    part.measures.push(measure);

    let mut score = Score::new(source);
    score.parts.push(part);
    score
}

fn quarters(names: &[&str]) -> Vec<(Pitch, QuarterLength)> {
    names.iter().map(|n| (pitch(n), ql(1))).collect()
}

fn names(score: &Score) -> Vec<String> {
    score.parts[0].notes().map(|n| n.pitch.to_string()).collect()
}

fn files_in(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Random diatonic melody in C major
fn random_melody(seed: u64, length: usize) -> Vec<(Pitch, QuarterLength)> {
    let scale = c_major().scale();
    let mut rng = StdRng::seed_from_u64(seed);
    let lengths = [ql_frac(1, 4), ql_frac(1, 2), ql(1), ql_frac(3, 2), ql(2), ql(3), ql(4)];
    (0..length)
        .map(|_| {
            let degree = rng.gen_range(1..=7u8);
            let octave = rng.gen_range(3..=5i8);
            let name = scale.name_at_degree(degree).unwrap();
            let duration = lengths[rng.gen_range(0..lengths.len())];
            (name.in_octave(octave), duration)
        })
        .collect()
}

/// The canonical ANXIETY example through files on disk
#[test]
fn test_anxiety_example_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("scale.xml");
    let score = score_from(&quarters(&["C4", "E4", "F4", "G4", "A4", "B4", "C5"]), Some(100.0), SourceFormat::MusicXml);
    musicxml::write_file(&score, &input).unwrap();

    let out_dir = dir.path().join("out").join("anxiety");
    let output = c_major_engine()
        .transform_file(&input, Emotion::Anxiety, &out_dir)
        .unwrap();

    assert!(out_dir.is_dir());
    assert_eq!(output.target_dir, out_dir);
    assert!(output.file_name.starts_with("scale_ANXIETY_"));
    assert!(output.file_name.ends_with(".xml"));
    assert_eq!(output.transformation.notes_changed, 2);

    let result = musicxml::read_file(&output.path).unwrap();
    assert_eq!(names(&result), ["C4", "Eb4", "F4", "G4", "Ab4", "B4", "C5"]);
    // Tempo is untouched by ANXIETY
    assert_eq!(result.parts[0].tempo_marking().unwrap().bpm, 100.0);
}

#[test]
fn test_repeated_runs_never_overwrite() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tune.xml");
    musicxml::write_file(&score_from(&quarters(&["C4", "D4", "E4", "F4"]), None, SourceFormat::MusicXml), &input).unwrap();

    let engine = c_major_engine();
    let first = engine.transform_file(&input, Emotion::Joy, dir.path()).unwrap();
    let second = engine.transform_file(&input, Emotion::Joy, dir.path()).unwrap();
    assert_ne!(first.file_name, second.file_name);
    assert!(first.path.exists() && second.path.exists());
}

#[test]
fn test_serenity_never_writes() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tune.xml");
    musicxml::write_file(&score_from(&quarters(&["C4", "E4"]), Some(90.0), SourceFormat::MusicXml), &input).unwrap();

    let out_dir = dir.path().join("serene");
    let err = c_major_engine()
        .transform_file(&input, Emotion::Serenity, &out_dir)
        .unwrap_err();
    assert!(matches!(err, EmotionError::Unimplemented("SERENITY")));
    assert!(files_in(&out_dir).is_empty());
}

#[test]
fn test_unknown_emotion_label() {
    let err = "NOSTALGIA".parse::<Emotion>().unwrap_err();
    assert!(matches!(err, EmotionError::UnsupportedEmotion(_)));
}

#[test]
fn test_sadness_without_tempo_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tune.xml");
    musicxml::write_file(&score_from(&quarters(&["E4", "A4"]), None, SourceFormat::MusicXml), &input).unwrap();

    let out_dir = dir.path().join("sad");
    let err = c_major_engine()
        .transform_file(&input, Emotion::Sadness, &out_dir)
        .unwrap_err();
    assert!(matches!(err, EmotionError::MissingTempoMarking("SADNESS")));
    assert!(files_in(&out_dir).is_empty());
}

#[test]
fn test_sadness_tempo_and_degrees() {
    let mut score = score_from(
        &quarters(&["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]),
        Some(132.0),
        SourceFormat::MusicXml,
    );
    c_major_engine().transform(&mut score, Emotion::Sadness).unwrap();

    assert_eq!(score.parts[0].tempo_marking().unwrap().bpm, 60.0);
    assert_eq!(names(&score), ["C4", "D4", "Eb4", "F4", "G4", "Ab4", "Bb4", "C5"]);
}

#[test]
fn test_minor_key_anxiety_uses_natural_minor_degrees() {
    // A natural minor: degree 3 is C, degree 6 is F
    let engine = EmotionTransformEngine::with_detector(FixedKey("A minor".parse().unwrap()));
    let mut score = score_from(&quarters(&["A4", "C5", "E5", "F5"]), None, SourceFormat::MusicXml);
    engine.transform(&mut score, Emotion::Anxiety).unwrap();
    assert_eq!(names(&score), ["A4", "Cb5", "E5", "Fb5"]);
}

#[test]
fn test_joy_property_on_random_melodies() {
    let scale = c_major().scale();
    for seed in 0..20 {
        let melody = random_melody(seed, 32);
        let mut score = score_from(&melody, None, SourceFormat::MusicXml);
        c_major_engine().transform(&mut score, Emotion::Joy).unwrap();

        for ((before, _), after) in melody.iter().zip(score.parts[0].notes()) {
            let degree = scale.degree_of(&after.pitch).unwrap();
            assert!(degree != 4 && degree != 7, "seed {}: {} left on degree {}", seed, after.pitch, degree);

            let movement = (after.pitch.midi() - before.midi()).abs();
            match scale.degree_of(before).unwrap() {
                4 => assert_eq!(after.pitch.pitch_class(), 7),
                7 => assert_eq!(after.pitch.pitch_class(), 0),
                _ => assert_eq!(after.pitch, *before),
            }
            assert!(movement <= 6);
        }
    }
}

#[test]
fn test_determination_property_on_random_melodies() {
    for seed in 0..20 {
        let melody = random_melody(seed, 24);
        let mut score = score_from(&melody, Some(120.0), SourceFormat::MusicXml);
        c_major_engine().transform(&mut score, Emotion::Determination).unwrap();

        for ((_, before), after) in melody.iter().zip(score.parts[0].notes()) {
            if *before <= ql(1) {
                assert_eq!(after.duration, *before / 2);
            } else {
                assert_eq!(after.duration, *before);
            }
        }
    }
}

#[test]
fn test_gratitude_echo_survives_musicxml() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("hymn.xml");
    let melody = vec![
        (pitch("G4"), ql(1)),
        (pitch("A4"), ql(1)),
        (pitch("B4"), ql(2)),
        (pitch("C5"), ql(4)),
    ];
    musicxml::write_file(&score_from(&melody, Some(72.0), SourceFormat::MusicXml), &input).unwrap();

    let output = c_major_engine()
        .transform_file(&input, Emotion::Gratitude, dir.path())
        .unwrap();
    assert_eq!(output.transformation.notes_inserted, 2);

    let result = musicxml::read_file(&output.path).unwrap();
    let part = &result.parts[0];

    // Bar 1: anchor G4, long B4 cut to a half beat, echo G4 after A4 at offset 1
    let bar1: Vec<(String, QuarterLength, QuarterLength)> = part.measures[0]
        .notes()
        .map(|n| (n.pitch.to_string(), n.duration, n.offset))
        .collect();
    assert_eq!(
        bar1,
        vec![
            ("G4".to_string(), ql(1), ql(0)),
            ("A4".to_string(), ql(1), ql(1)),
            ("G4".to_string(), ql_frac(1, 2), ql(1)),
            ("B4".to_string(), ql_frac(1, 2), ql(2)),
        ]
    );

    // Bar 2: C5 anchors and triggers its own echo
    let bar2: Vec<(String, QuarterLength)> = part.measures[1]
        .notes()
        .map(|n| (n.pitch.to_string(), n.duration))
        .collect();
    assert_eq!(
        bar2,
        vec![("C5".to_string(), ql(1)), ("C5".to_string(), ql_frac(1, 2))]
    );
}

#[test]
fn test_awe_stops_at_trailing_transition() {
    let mut score = score_from(&quarters(&["C4", "F4", "D4", "G4"]), Some(96.0), SourceFormat::MusicXml);
    let result = c_major_engine().transform(&mut score, Emotion::Awe).unwrap();

    // C -> F moves F to A; the trailing G has nothing after it
    assert_eq!(result.notes_changed, 1);
    assert_eq!(names(&score), ["C4", "A4", "D4", "G4"]);
    assert_eq!(score.parts[0].tempo_marking().unwrap().bpm, 60.0);
}

#[test]
fn test_transform_is_deterministic() {
    let melody = random_melody(7, 40);
    for emotion in Emotion::SUPPORTED {
        let mut first = score_from(&melody, Some(110.0), SourceFormat::MusicXml);
        let mut second = first.clone();
        let engine = EmotionTransformEngine::new();
        engine.transform(&mut first, emotion).unwrap();
        engine.transform(&mut second, emotion).unwrap();
        assert_eq!(
            musicxml::write_string(&first).unwrap(),
            musicxml::write_string(&second).unwrap(),
            "{} is not deterministic",
            emotion
        );
    }
}

#[test]
fn test_midi_input_with_detected_key() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("theme.mid");

    // G major: the scale plus tonic and dominant
    let melody: Vec<(Pitch, QuarterLength)> = [67, 69, 71, 72, 74, 76, 78, 79, 74, 67]
        .iter()
        .map(|&m| (Pitch::from_midi_sharp(m), ql(1)))
        .collect();
    let source = score_from(&melody, Some(100.0), SourceFormat::Midi);
    MidiExporter::from_score(&source).export(&input).unwrap();

    let output = EmotionTransformEngine::with_detector(KrumhanslDetector)
        .transform_file(&input, Emotion::Joy, dir.path())
        .unwrap();
    assert_eq!(output.transformation.key.to_string(), "G major");
    assert!(output.file_name.starts_with("theme_JOY_"));

    let result = musicxml::read_file(&output.path).unwrap();
    // C5 (degree 4) -> D5, F#5 (degree 7) -> G5
    assert_eq!(
        names(&result),
        ["G4", "A4", "B4", "D5", "D5", "E5", "G5", "G5", "D5", "G4"]
    );
}

#[test]
fn test_multi_track_midi_is_malformed() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("duet.mid");

    let mut source = score_from(&quarters(&["C4", "E4", "G4"]), Some(100.0), SourceFormat::Midi);
    let mut second = source.parts[0].clone();
    second.id = "P2".to_string();
    second.name = "Harmony".to_string();
    source.parts.push(second);
    MidiExporter::from_score(&source).export(&input).unwrap();

    let out_dir = dir.path().join("out");
    let err = c_major_engine()
        .transform_file(&input, Emotion::Anxiety, &out_dir)
        .unwrap_err();
    assert!(matches!(err, EmotionError::MalformedScore(_)));
    assert!(files_in(&out_dir).is_empty());
}

#[test]
fn test_multi_part_musicxml_transforms_every_part() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("duet.xml");

    let mut score = score_from(&quarters(&["E5", "A5"]), None, SourceFormat::MusicXml);
    let mut bass = score_from(&quarters(&["E3", "G3"]), None, SourceFormat::MusicXml).parts.remove(0);
    bass.id = "P2".to_string();
    bass.name = "Bass".to_string();
    score.parts.push(bass);
    musicxml::write_file(&score, &input).unwrap();

    let output = c_major_engine()
        .transform_file(&input, Emotion::Anxiety, dir.path())
        .unwrap();
    assert_eq!(output.transformation.parts, 2);

    let result = musicxml::read_file(&output.path).unwrap();
    assert_eq!(names(&result), ["Eb5", "Ab5"]);
    let bass: Vec<String> = result.parts[1].notes().map(|n| n.pitch.to_string()).collect();
    assert_eq!(bass, ["Eb3", "G3"]);
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tune.abc");
    fs::write(&input, "X:1").unwrap();
    let err = c_major_engine()
        .transform_file(&input, Emotion::Joy, dir.path())
        .unwrap_err();
    assert!(matches!(err, EmotionError::UnsupportedFormat(_)));
}

#[test]
fn test_chromatic_notes_pass_through() {
    let mut score = score_from(&quarters(&["C4", "F#4", "Bb4", "E4"]), None, SourceFormat::MusicXml);
    c_major_engine().transform(&mut score, Emotion::Anxiety).unwrap();
    assert_eq!(names(&score), ["C4", "F#4", "Bb4", "Eb4"]);
}
