// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Spelled pitches.
//!
//! Pitches keep their letter name and accidental so that lowering E gives
//! E-flat rather than D-sharp, which matters once the score is written back
//! out as notation.

use std::fmt;
use std::str::FromStr;

use crate::error::EmotionError;

use super::Interval;

/// MIDI note number (middle C = 60)
pub type MidiNote = i32;

/// Letter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// All letters in ascending order
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    /// Position of the letter within the octave (C = 0)
    pub fn index(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 1,
            Step::E => 2,
            Step::F => 3,
            Step::G => 4,
            Step::A => 5,
            Step::B => 6,
        }
    }

    /// Letter at a diatonic index, wrapping every seven letters
    pub fn from_index(index: i32) -> Self {
        Step::ALL[index.rem_euclid(7) as usize]
    }

    /// Semitones above C for the natural letter
    pub fn semitone(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::C => "C",
            Step::D => "D",
            Step::E => "E",
            Step::F => "F",
            Step::G => "G",
            Step::A => "A",
            Step::B => "B",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn write_accidental(f: &mut fmt::Formatter<'_>, alter: i8) -> fmt::Result {
    let symbol = if alter > 0 { "#" } else { "b" };
    for _ in 0..alter.unsigned_abs() {
        f.write_str(symbol)?;
    }
    Ok(())
}

/// A letter plus accidental with no octave (a spelled pitch class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitchName {
    pub step: Step,
    /// Semitones of alteration (-1 = flat, +1 = sharp)
    pub alter: i8,
}

impl PitchName {
    pub fn new(step: Step, alter: i8) -> Self {
        Self { step, alter }
    }

    pub fn natural(step: Step) -> Self {
        Self { step, alter: 0 }
    }

    /// Pitch class (0-11)
    pub fn pitch_class(self) -> u8 {
        (self.step.semitone() + self.alter as i32).rem_euclid(12) as u8
    }

    /// Place this name in an octave
    pub fn in_octave(self, octave: i8) -> Pitch {
        Pitch::new(self.step, self.alter, octave)
    }
}

impl FromStr for PitchName {
    type Err = EmotionError;

    /// Accepts `C`, `F#`, `Bb`, `Ebb`, `Cx`, and `E-` with a hyphen for flat
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let step = chars
            .next()
            .and_then(Step::from_char)
            .ok_or_else(|| EmotionError::parse("pitch name", s))?;

        let mut alter = 0i8;
        for c in chars {
            alter += match c {
                '#' | 's' | '♯' => 1,
                'x' => 2,
                'b' | '-' | '♭' => -1,
                _ => return Err(EmotionError::parse("pitch name", s)),
            };
        }
        Ok(Self { step, alter })
    }
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step)?;
        write_accidental(f, self.alter)
    }
}

/// A spelled pitch in a specific octave (scientific octave numbering, C4 = 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub step: Step,
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Self { step, alter, octave }
    }

    /// Spell a MIDI number with sharps
    pub fn from_midi_sharp(midi: MidiNote) -> Self {
        const SPELLING: [(Step, i8); 12] = [
            (Step::C, 0),
            (Step::C, 1),
            (Step::D, 0),
            (Step::D, 1),
            (Step::E, 0),
            (Step::F, 0),
            (Step::F, 1),
            (Step::G, 0),
            (Step::G, 1),
            (Step::A, 0),
            (Step::A, 1),
            (Step::B, 0),
        ];
        let (step, alter) = SPELLING[midi.rem_euclid(12) as usize];
        Self::new(step, alter, (midi.div_euclid(12) - 1) as i8)
    }

    /// Spell a MIDI number with flats
    pub fn from_midi_flat(midi: MidiNote) -> Self {
        const SPELLING: [(Step, i8); 12] = [
            (Step::C, 0),
            (Step::D, -1),
            (Step::D, 0),
            (Step::E, -1),
            (Step::E, 0),
            (Step::F, 0),
            (Step::G, -1),
            (Step::G, 0),
            (Step::A, -1),
            (Step::A, 0),
            (Step::B, -1),
            (Step::B, 0),
        ];
        let (step, alter) = SPELLING[midi.rem_euclid(12) as usize];
        Self::new(step, alter, (midi.div_euclid(12) - 1) as i8)
    }

    /// Spell `name` so that its MIDI number is exactly `midi`
    pub fn with_name_at(name: PitchName, midi: MidiNote) -> Self {
        let natural = name.step.semitone() + name.alter as i32;
        let octave = (midi - natural).div_euclid(12) - 1;
        Self::new(name.step, name.alter, octave as i8)
    }

    pub fn midi(&self) -> MidiNote {
        (self.octave as i32 + 1) * 12 + self.step.semitone() + self.alter as i32
    }

    pub fn pitch_class(&self) -> u8 {
        self.midi().rem_euclid(12) as u8
    }

    pub fn name(&self) -> PitchName {
        PitchName::new(self.step, self.alter)
    }

    /// Absolute diatonic position (octave * 7 + letter index)
    pub fn diatonic_index(&self) -> i32 {
        self.octave as i32 * 7 + self.step.index()
    }

    /// Move by an interval, respelling the letter by the interval's steps
    pub fn transpose(&self, interval: Interval) -> Self {
        let target_index = self.diatonic_index() + interval.steps;
        let step = Step::from_index(target_index);
        let octave = target_index.div_euclid(7);
        let target_midi = self.midi() + interval.semitones;
        let natural_midi = (octave + 1) * 12 + step.semitone();
        Self::new(step, (target_midi - natural_midi) as i8, octave as i8)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step)?;
        write_accidental(f, self.alter)?;
        write!(f, "{}", self.octave)
    }
}
