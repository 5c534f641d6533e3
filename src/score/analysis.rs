// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Key detection.
//!
//! The engine only consumes a `Key`; where it comes from is behind the
//! `KeyDetector` trait so a fixed key from configuration can stand in for
//! analysis.

use crate::music::{Key, Mode, PitchName, Step};

use super::Score;

/// Krumhansl-Kessler major key profile
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Conventional tonic spelling per pitch class (flats for Db, Eb, Gb, Ab, Bb)
const TONIC_NAMES: [(Step, i8); 12] = [
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

/// Minor tonics read better with sharps (C#, F#, G#) than their flat twins
const MINOR_TONIC_NAMES: [(Step, i8); 12] = [
    (Step::C, 0),
    (Step::C, 1),
    (Step::D, 0),
    (Step::E, -1),
    (Step::E, 0),
    (Step::F, 0),
    (Step::F, 1),
    (Step::G, 0),
    (Step::G, 1),
    (Step::A, 0),
    (Step::B, -1),
    (Step::B, 0),
];

/// Source of the key a transformation is keyed to
pub trait KeyDetector {
    fn detect_key(&self, score: &Score) -> Key;
}

/// Always reports the same key
#[derive(Debug, Clone, Copy)]
pub struct FixedKey(pub Key);

impl KeyDetector for FixedKey {
    fn detect_key(&self, _score: &Score) -> Key {
        self.0
    }
}

/// Krumhansl-Schmuckler key finding.
///
/// Builds a duration-weighted pitch-class histogram and correlates it
/// against all 24 major/minor profiles; the best Pearson correlation wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KrumhanslDetector;

impl KrumhanslDetector {
    /// Correlation of the best key, alongside the key itself
    pub fn detect_with_confidence(&self, score: &Score) -> (Key, f64) {
        let mut histogram = [0.0_f64; 12];
        for note in score.notes() {
            let weight = *note.duration.numer() as f64 / *note.duration.denom() as f64;
            histogram[note.pitch.pitch_class() as usize] += weight.max(f64::EPSILON);
        }

        let total: f64 = histogram.iter().sum();
        if total == 0.0 {
            return (Key::new(PitchName::natural(Step::C), Mode::Major), 0.0);
        }
        for h in &mut histogram {
            *h /= total;
        }

        let mut best_root = 0usize;
        let mut best_mode = Mode::Major;
        let mut best_corr = f64::NEG_INFINITY;

        for root in 0..12 {
            let rotated: [f64; 12] = std::array::from_fn(|i| histogram[(i + root) % 12]);

            let major_corr = pearson(&rotated, &MAJOR_PROFILE);
            if major_corr > best_corr {
                best_corr = major_corr;
                best_root = root;
                best_mode = Mode::Major;
            }

            let minor_corr = pearson(&rotated, &MINOR_PROFILE);
            if minor_corr > best_corr {
                best_corr = minor_corr;
                best_root = root;
                best_mode = Mode::Minor;
            }
        }

        let (step, alter) = match best_mode {
            Mode::Major => TONIC_NAMES[best_root],
            Mode::Minor => MINOR_TONIC_NAMES[best_root],
        };
        (Key::new(PitchName::new(step, alter), best_mode), best_corr)
    }
}

impl KeyDetector for KrumhanslDetector {
    fn detect_key(&self, score: &Score) -> Key {
        self.detect_with_confidence(score).0
    }
}

/// Pearson correlation coefficient between two 12-element arrays
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}
