// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error taxonomy for the transformation engine and score I/O.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::music::Pitch;

/// Errors raised while loading, transforming or writing a score.
#[derive(Debug, Error)]
pub enum EmotionError {
    /// Target label is not one of the known emotions
    #[error("unsupported emotion '{0}'")]
    UnsupportedEmotion(String),

    /// Label is known but has no rule set yet
    #[error("{0} transformation is not implemented")]
    Unimplemented(&'static str),

    /// A tempo-sensitive rule found no metronome mark to rewrite
    #[error("{0} requires a tempo marking but the score has none")]
    MissingTempoMarking(&'static str),

    /// Pitch is chromatic to the detected scale
    #[error("pitch {pitch} is not diatonic to {scale}")]
    DegreeNotFound { pitch: Pitch, scale: String },

    /// Part layout does not match what the input shape requires
    #[error("malformed score: {0}")]
    MalformedScore(String),

    /// File extension the loader does not understand
    #[error("unsupported score format: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// Structurally valid file with content we cannot interpret
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("midi error: {0}")]
    Midi(#[from] midly::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EmotionError {
    pub(crate) fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        EmotionError::Parse {
            what,
            detail: detail.into(),
        }
    }

    /// Per-note conditions that a rule swallows instead of aborting the pass
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EmotionError::DegreeNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, EmotionError>;
