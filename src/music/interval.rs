// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Signed intervals between spelled pitches.

use std::fmt;

use super::Pitch;

/// Semitone offset type
pub type Semitones = i32;

/// A signed interval measured both in letter steps and in semitones.
///
/// Carrying both keeps spelling intact when a note is moved: a minor third
/// down from G lands on E-flat, never D-sharp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Diatonic steps (0 = unison, 2 = third, negative = descending)
    pub steps: i32,
    /// Chromatic distance
    pub semitones: Semitones,
}

impl Interval {
    /// Descending augmented unison: same letter, one semitone lower
    pub const CHROMATIC_SEMITONE_DOWN: Interval = Interval { steps: 0, semitones: -1 };

    pub const UNISON: Interval = Interval { steps: 0, semitones: 0 };

    pub fn new(steps: i32, semitones: Semitones) -> Self {
        Self { steps, semitones }
    }

    /// Interval that moves `from` exactly onto `to`
    pub fn between(from: &Pitch, to: &Pitch) -> Self {
        Self {
            steps: to.diatonic_index() - from.diatonic_index(),
            semitones: to.midi() - from.midi(),
        }
    }

    pub fn is_unison(&self) -> bool {
        *self == Self::UNISON
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+} steps / {:+} semitones", self.steps, self.semitones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Step;

    #[test]
    fn test_between_ascending() {
        let f4 = Pitch::new(Step::F, 0, 4);
        let g4 = Pitch::new(Step::G, 0, 4);
        assert_eq!(Interval::between(&f4, &g4), Interval::new(1, 2));
    }

    #[test]
    fn test_between_descending_across_octave() {
        let c5 = Pitch::new(Step::C, 0, 5);
        let b4 = Pitch::new(Step::B, 0, 4);
        assert_eq!(Interval::between(&c5, &b4), Interval::new(-1, -1));
    }

    #[test]
    fn test_applying_between_lands_on_target() {
        let from = Pitch::new(Step::D, 1, 3);
        let to = Pitch::new(Step::B, -1, 5);
        let moved = from.transpose(Interval::between(&from, &to));
        assert_eq!(moved, to);
    }

    #[test]
    fn test_unison() {
        let a = Pitch::new(Step::A, 0, 4);
        assert!(Interval::between(&a, &a).is_unison());
    }
}
