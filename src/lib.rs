// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! emotransform - rewrite a melody so it evokes a target emotion.
//!
//! Rules are written in scale degrees of the melody's key: pitches are
//! lowered or relocated by degree, tempo is slowed, and rhythm is tightened
//! or echoed. Scores come in as MIDI or MusicXML and go out as MusicXML,
//! optionally harmonized into four parts by an external model.

pub mod config;
pub mod emotion;
pub mod error;
pub mod harmonize;
pub mod music;
pub mod score;

pub use config::Settings;
pub use emotion::{Emotion, EmotionTransformEngine, RuleSettings, TransformOutput, Transformation};
pub use error::{EmotionError, Result};
pub use music::{Interval, Key, Mode, Pitch, Scale};
pub use score::{FixedKey, KeyDetector, KrumhanslDetector, Score};
