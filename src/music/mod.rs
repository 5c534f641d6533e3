// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Music theory primitives for the transformation rules.
//!
//! This module provides spelled pitches, intervals, and the scale/key types
//! used to resolve scale degrees.

pub mod interval;
pub mod pitch;
pub mod scale;

pub use interval::{Interval, Semitones};
pub use pitch::{MidiNote, Pitch, PitchName, Step};
pub use scale::{Degree, Key, Mode, Scale};
