// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scale and key system for degree-based transformations.
//!
//! Provides the two diatonic modes the analyzer reports, spelled seven-note
//! scales, and the degree <-> pitch lookups every emotion rule is written in
//! terms of.

use std::fmt;
use std::str::FromStr;

use crate::error::{EmotionError, Result};

use super::pitch::{MidiNote, Pitch, PitchName, Step};

/// Scale degree (1-7)
pub type Degree = u8;

/// Modes produced by key detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    /// Natural (Aeolian) minor
    Minor,
}

impl Mode {
    /// Semitones from the tonic for each degree
    pub fn intervals(self) -> [i32; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }

    /// Parse mode from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" | "ionian" | "maj" => Some(Mode::Major),
            "minor" | "aeolian" | "min" | "naturalminor" | "natural_minor" => Some(Mode::Minor),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of each natural letter on the circle of fifths relative to C
fn letter_fifths(step: Step) -> i32 {
    match step {
        Step::F => -1,
        Step::C => 0,
        Step::G => 1,
        Step::D => 2,
        Step::A => 3,
        Step::E => 4,
        Step::B => 5,
    }
}

/// Major tonic for a key signature expressed in fifths
fn major_tonic_for_fifths(fifths: i32) -> PitchName {
    const ORDER: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];
    let shifted = fifths + 1;
    PitchName::new(ORDER[shifted.rem_euclid(7) as usize], shifted.div_euclid(7) as i8)
}

/// A spelled seven-note scale
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    tonic: PitchName,
    mode: Mode,
    degrees: [PitchName; 7],
}

impl Scale {
    /// Spell the scale on consecutive letters starting from the tonic
    pub fn new(tonic: PitchName, mode: Mode) -> Self {
        let intervals = mode.intervals();
        let tonic_semitone = tonic.step.semitone() + tonic.alter as i32;

        let degrees = std::array::from_fn(|i| {
            let step = Step::from_index(tonic.step.index() + i as i32);
            let target = tonic_semitone + intervals[i];
            let mut alter = (target - step.semitone()).rem_euclid(12);
            if alter > 6 {
                alter -= 12;
            }
            PitchName::new(step, alter as i8)
        });

        Self {
            tonic,
            mode,
            degrees,
        }
    }

    pub fn tonic(&self) -> PitchName {
        self.tonic
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Spelled pitch names, degree 1 first
    pub fn degrees(&self) -> &[PitchName; 7] {
        &self.degrees
    }

    /// Key signature in fifths (negative = flats)
    pub fn fifths(&self) -> i32 {
        let tonic = letter_fifths(self.tonic.step) + 7 * self.tonic.alter as i32;
        match self.mode {
            Mode::Major => tonic,
            Mode::Minor => tonic - 3,
        }
    }

    /// Degree for a pitch class, if it is diatonic
    pub fn degree_of_pitch_class(&self, pitch_class: u8) -> Option<Degree> {
        self.degrees
            .iter()
            .position(|name| name.pitch_class() == pitch_class % 12)
            .map(|i| i as Degree + 1)
    }

    /// Scale degree of a pitch regardless of octave or enharmonic spelling
    pub fn degree_of(&self, pitch: &Pitch) -> Result<Degree> {
        self.degree_of_pitch_class(pitch.pitch_class())
            .ok_or_else(|| EmotionError::DegreeNotFound {
                pitch: *pitch,
                scale: self.to_string(),
            })
    }

    /// Spelled name at a degree (1-based)
    pub fn name_at_degree(&self, degree: Degree) -> Option<PitchName> {
        if degree == 0 || degree > 7 {
            return None;
        }
        Some(self.degrees[degree as usize - 1])
    }

    /// Pitch at `degree` in whichever octave is closest to `reference`.
    ///
    /// A tritone is equally far either way; that tie resolves upward.
    pub fn pitch_at_degree(&self, degree: Degree, reference: &Pitch) -> Option<Pitch> {
        let name = self.name_at_degree(degree)?;
        let up = (name.pitch_class() as i32 - reference.pitch_class() as i32).rem_euclid(12);
        let offset = if up <= 6 { up } else { up - 12 };
        Some(Pitch::with_name_at(name, reference.midi() + offset))
    }

    /// Spell a MIDI number for this key: diatonic names where possible,
    /// otherwise sharps in sharp keys and flats in flat keys
    pub fn spell(&self, midi: MidiNote) -> Pitch {
        match self.degree_of_pitch_class(midi.rem_euclid(12) as u8) {
            Some(degree) => Pitch::with_name_at(self.degrees[degree as usize - 1], midi),
            None if self.fifths() < 0 => Pitch::from_midi_flat(midi),
            None => Pitch::from_midi_sharp(midi),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// A musical key: tonic plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub tonic: PitchName,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: PitchName, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// Key from a signature in fifths, as found in notation files
    pub fn from_fifths(fifths: i32, mode: Mode) -> Self {
        let tonic = match mode {
            Mode::Major => major_tonic_for_fifths(fifths),
            Mode::Minor => major_tonic_for_fifths(fifths + 3),
        };
        Self { tonic, mode }
    }

    /// Build the scale this key implies
    pub fn scale(&self) -> Scale {
        Scale::new(self.tonic, self.mode)
    }
}

impl FromStr for Key {
    type Err = EmotionError;

    /// Parse "D minor", "F# major", "Bb" (major when the mode is omitted)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let tonic: PitchName = words
            .next()
            .ok_or_else(|| EmotionError::parse("key", s))?
            .parse()?;
        let mode = match words.next() {
            Some(word) => Mode::from_str(word).ok_or_else(|| EmotionError::parse("key mode", word))?,
            None => Mode::Major,
        };
        if words.next().is_some() {
            return Err(EmotionError::parse("key", s));
        }
        Ok(Self { tonic, mode })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}
