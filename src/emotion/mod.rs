// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Emotion-driven melody transformation.
//!
//! Each emotion is a rule set that rewrites pitches by scale degree,
//! changes the tempo, or reshapes rhythm. The engine picks the rule set,
//! runs it once over the selected parts and writes the result.

pub mod engine;
pub mod rhythm;
pub mod rules;

pub use engine::{EmotionTransformEngine, TransformOutput, Transformation};
pub use rules::RuleSettings;

use std::fmt;
use std::str::FromStr;

use crate::error::EmotionError;

/// Target emotion for a transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    /// Lower degrees 3 and 6
    Anxiety,
    /// Slow to 60 BPM and lower degrees 3, 6 and 7
    Sadness,
    /// Slow to 60 BPM and soften tonic/dominant motion
    Awe,
    /// Pentatonic: degree 4 to 5, degree 7 to 1
    Joy,
    /// Halve short notes
    Determination,
    /// Shorten long notes and echo the phrase's first note
    Gratitude,
    /// Accepted label with no rule set
    Serenity,
}

impl Emotion {
    /// Every label the parser accepts
    pub const ALL: [Emotion; 7] = [
        Emotion::Anxiety,
        Emotion::Awe,
        Emotion::Gratitude,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Determination,
        Emotion::Serenity,
    ];

    /// Labels that have a working rule set
    pub const SUPPORTED: [Emotion; 6] = [
        Emotion::Anxiety,
        Emotion::Awe,
        Emotion::Gratitude,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Determination,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Anxiety => "ANXIETY",
            Emotion::Sadness => "SADNESS",
            Emotion::Awe => "AWE",
            Emotion::Joy => "JOY",
            Emotion::Determination => "DETERMINATION",
            Emotion::Gratitude => "GRATITUDE",
            Emotion::Serenity => "SERENITY",
        }
    }

    pub fn is_implemented(self) -> bool {
        self != Emotion::Serenity
    }

    /// Emotions that rewrite the tempo; the harmonizer drops it, so it is restored afterwards
    pub fn is_tempo_slowed(self) -> bool {
        matches!(self, Emotion::Awe | Emotion::Sadness)
    }

    /// Comma-separated list of working labels, for help and error output
    pub fn supported_labels() -> String {
        Self::SUPPORTED
            .iter()
            .map(|e| e.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Emotion {
    type Err = EmotionError;

    /// Case-insensitive label match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EmotionError::UnsupportedEmotion(s.to_string()))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
