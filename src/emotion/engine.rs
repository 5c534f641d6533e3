// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transformation engine.
//!
//! Checks every structural precondition before touching the score, detects
//! the key once, then dispatches to exactly one rule set.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EmotionError, Result};
use crate::music::Key;
use crate::score::{self, musicxml, KeyDetector, KrumhanslDetector, Line, Score, SourceFormat};

use super::rhythm;
use super::rules::{self, RuleSettings};
use super::Emotion;

/// Extension of the interchange file the engine writes
pub const OUTPUT_EXTENSION: &str = "xml";

/// What one in-memory transformation did
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub emotion: Emotion,
    pub key: Key,
    /// Number of parts the rules walked
    pub parts: usize,
    pub notes_changed: usize,
    pub notes_inserted: usize,
}

/// Where a file transformation was written
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub file_name: String,
    pub target_dir: PathBuf,
    pub path: PathBuf,
    pub transformation: Transformation,
}

/// Applies one emotion rule set to a score
#[derive(Debug, Clone)]
pub struct EmotionTransformEngine<D = KrumhanslDetector> {
    detector: D,
    rules: RuleSettings,
}

impl EmotionTransformEngine<KrumhanslDetector> {
    /// Engine with key analysis and default rule constants
    pub fn new() -> Self {
        Self::with_detector(KrumhanslDetector)
    }
}

impl Default for EmotionTransformEngine<KrumhanslDetector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: KeyDetector> EmotionTransformEngine<D> {
    pub fn with_detector(detector: D) -> Self {
        Self {
            detector,
            rules: RuleSettings::default(),
        }
    }

    pub fn with_rules(mut self, rules: RuleSettings) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleSettings {
        &self.rules
    }

    /// Rewrite `score` in place for `emotion`.
    ///
    /// A rejected request leaves the score untouched.
    pub fn transform(&self, score: &mut Score, emotion: Emotion) -> Result<Transformation> {
        if !emotion.is_implemented() {
            return Err(EmotionError::Unimplemented(emotion.label()));
        }
        let selected = select_parts(score)?;
        let has_tempo = score.parts[selected.clone()]
            .iter()
            .any(|p| p.tempo_marking().is_some());
        if emotion.is_tempo_slowed() && !has_tempo {
            return Err(EmotionError::MissingTempoMarking(emotion.label()));
        }

        let key = self.detector.detect_key(score);
        let scale = key.scale();
        info!(%key, %emotion, "transforming");

        let mut line = Line::new(score.parts[selected].iter_mut().collect());
        let parts = line.part_count();
        let (notes_changed, notes_inserted) = match emotion {
            Emotion::Anxiety => (rules::anxiety(&mut line, &scale), 0),
            Emotion::Sadness => (rules::sadness(&mut line, &scale, &self.rules)?, 0),
            Emotion::Awe => (rules::awe(&mut line, &scale, &self.rules)?, 0),
            Emotion::Joy => (rules::joy(&mut line, &scale), 0),
            Emotion::Determination => (rhythm::determination(&mut line, &self.rules), 0),
            Emotion::Gratitude => {
                let outcome = rhythm::gratitude(&mut line, &self.rules);
                (outcome.shortened, outcome.echoes)
            }
            Emotion::Serenity => return Err(EmotionError::Unimplemented(emotion.label())),
        };

        info!(notes_changed, notes_inserted, "transformation complete");
        Ok(Transformation {
            emotion,
            key,
            parts,
            notes_changed,
            notes_inserted,
        })
    }

    /// Load `input`, transform it and write MusicXML into `target_dir`
    pub fn transform_file(&self, input: &Path, emotion: Emotion, target_dir: &Path) -> Result<TransformOutput> {
        if !emotion.is_implemented() {
            return Err(EmotionError::Unimplemented(emotion.label()));
        }
        let mut score = score::load(input)?;
        let transformation = self.transform(&mut score, emotion)?;

        fs::create_dir_all(target_dir)?;
        let file_name = output_file_name(input, emotion);
        let path = target_dir.join(&file_name);
        musicxml::write_file(&score, &path)?;
        info!(path = %path.display(), "wrote transformed score");

        Ok(TransformOutput {
            file_name,
            target_dir: target_dir.to_path_buf(),
            path,
            transformation,
        })
    }
}

/// `<stem>_<EMOTION>_<uuid>.xml`
pub fn output_file_name(input: &Path, emotion: Emotion) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("score");
    format!("{}_{}_{}.{}", stem, emotion.label(), Uuid::new_v4(), OUTPUT_EXTENSION)
}

/// Parts the rules walk: the single MIDI track, or the whole MusicXML score
fn select_parts(score: &Score) -> Result<Range<usize>> {
    match (score.source, score.parts.len()) {
        (_, 0) => Err(EmotionError::MalformedScore("score has no parts".into())),
        (SourceFormat::Midi, 1) => Ok(0..1),
        (SourceFormat::Midi, count) => Err(EmotionError::MalformedScore(format!(
            "MIDI input must hold exactly one melodic part, found {}",
            count
        ))),
        (SourceFormat::MusicXml, count) => {
            if count > 1 {
                debug!(parts = count, "walking every part as one line");
            }
            Ok(0..count)
        }
    }
}
