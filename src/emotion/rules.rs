// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch and tempo rules.
//!
//! Every relocation computes the interval from the note's current pitch to
//! the target and transposes by it, so octave placement is kept. Degrees are
//! recomputed at the moment a rule looks at a note.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EmotionError, Result};
use crate::music::{Degree, Interval, Scale};
use crate::score::{ql_from_f64, Line, Note, NoteSlot, QuarterLength};

/// Degrees ANXIETY lowers
pub const ANXIETY_DEGREES: [Degree; 2] = [3, 6];

/// Degrees SADNESS lowers
pub const SADNESS_DEGREES: [Degree; 3] = [3, 6, 7];

/// Tunable constants for the rule sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Quarter-note BPM for SADNESS and AWE
    #[serde(default = "default_slowed_bpm")]
    pub slowed_bpm: f64,

    /// GRATITUDE echo length in quarters
    #[serde(default = "default_echo_length")]
    pub echo_length: f64,

    /// GRATITUDE echo position within the measure, in quarters
    #[serde(default = "default_echo_offset")]
    pub echo_offset: f64,

    /// GRATITUDE shortens notes at least this long
    #[serde(default = "default_long_note")]
    pub long_note: f64,

    /// DETERMINATION halves notes at most this long
    #[serde(default = "default_short_note")]
    pub short_note: f64,
}

fn default_slowed_bpm() -> f64 {
    60.0
}

fn default_echo_length() -> f64 {
    0.5
}

fn default_echo_offset() -> f64 {
    1.0
}

fn default_long_note() -> f64 {
    2.0
}

fn default_short_note() -> f64 {
    1.0
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            slowed_bpm: default_slowed_bpm(),
            echo_length: default_echo_length(),
            echo_offset: default_echo_offset(),
            long_note: default_long_note(),
            short_note: default_short_note(),
        }
    }
}

impl RuleSettings {
    pub fn echo_length(&self) -> QuarterLength {
        ql_from_f64(self.echo_length)
    }

    pub fn echo_offset(&self) -> QuarterLength {
        ql_from_f64(self.echo_offset)
    }

    pub fn long_note(&self) -> QuarterLength {
        ql_from_f64(self.long_note)
    }

    pub fn short_note(&self) -> QuarterLength {
        ql_from_f64(self.short_note)
    }
}

/// Degree of the note at `slot`, or `None` when it is chromatic (logged and skipped)
fn degree_at(line: &Line, slot: NoteSlot, scale: &Scale) -> Option<Degree> {
    let note = line.note(slot)?;
    match scale.degree_of(&note.pitch) {
        Ok(degree) => Some(degree),
        Err(err) => {
            skip_note(slot, &err);
            None
        }
    }
}

fn skip_note(slot: NoteSlot, err: &EmotionError) {
    if err.is_recoverable() {
        warn!(measure = slot.measure + 1, "{}; note left unchanged", err);
    }
}

/// Move a note onto `degree` in the octave nearest its current pitch
pub fn relocate(note: &mut Note, scale: &Scale, degree: Degree) -> bool {
    let Some(target) = scale.pitch_at_degree(degree, &note.pitch) else {
        return false;
    };
    let interval = Interval::between(&note.pitch, &target);
    if interval.is_unison() {
        return false;
    }
    debug!(from = %note.pitch, to = %target, degree, "relocate");
    note.pitch = note.pitch.transpose(interval);
    true
}

/// Lower every note on one of `degrees` by a chromatic semitone
pub fn lower_degrees(line: &mut Line, scale: &Scale, degrees: &[Degree]) -> usize {
    let mut changed = 0;
    for slot in line.note_positions() {
        let Some(degree) = degree_at(line, slot, scale) else {
            continue;
        };
        if !degrees.contains(&degree) {
            continue;
        }
        if let Some(note) = line.note_mut(slot) {
            let lowered = note.pitch.transpose(Interval::CHROMATIC_SEMITONE_DOWN);
            debug!(from = %note.pitch, to = %lowered, degree, "lower");
            note.pitch = lowered;
            changed += 1;
        }
    }
    changed
}

/// Rewrite the line's earliest tempo marking
pub fn slow_tempo(line: &mut Line, bpm: f64, emotion: &'static str) -> Result<()> {
    let marking = line
        .tempo_marking_mut()
        .ok_or(EmotionError::MissingTempoMarking(emotion))?;
    debug!(from = marking.bpm, to = bpm, "tempo");
    marking.set_quarter_bpm(bpm);
    Ok(())
}

pub fn anxiety(line: &mut Line, scale: &Scale) -> usize {
    lower_degrees(line, scale, &ANXIETY_DEGREES)
}

pub fn sadness(line: &mut Line, scale: &Scale, settings: &RuleSettings) -> Result<usize> {
    slow_tempo(line, settings.slowed_bpm, "SADNESS")?;
    Ok(lower_degrees(line, scale, &SADNESS_DEGREES))
}

/// Replace degree 4 with 5 and degree 7 with 1
pub fn joy(line: &mut Line, scale: &Scale) -> usize {
    let mut changed = 0;
    for slot in line.note_positions() {
        let target = match degree_at(line, slot, scale) {
            Some(4) => 5,
            Some(7) => 1,
            _ => continue,
        };
        if let Some(note) = line.note_mut(slot) {
            if relocate(note, scale, target) {
                changed += 1;
            }
        }
    }
    changed
}

/// Interesting next degrees for each degree that opens an AWE transition
fn awe_transitions(degree: Degree) -> Option<&'static [Degree]> {
    match degree {
        1 => Some(&[4, 5][..]),
        4 | 5 => Some(&[1][..]),
        _ => None,
    }
}

/// Soften tonic/dominant motion.
///
/// Walks a (current, next) window over the notes. 1 -> 4/5 moves the next
/// note to degree 6; 4/5 -> 1 moves the current note to degree 3. When a
/// transition degree has no following note the pass stops there.
pub fn awe(line: &mut Line, scale: &Scale, settings: &RuleSettings) -> Result<usize> {
    slow_tempo(line, settings.slowed_bpm, "AWE")?;

    let slots = line.note_positions();
    let mut changed = 0;
    for (index, &current_slot) in slots.iter().enumerate() {
        let Some(current) = degree_at(line, current_slot, scale) else {
            continue;
        };
        let Some(wanted) = awe_transitions(current) else {
            continue;
        };
        let Some(&next_slot) = slots.get(index + 1) else {
            debug!(degree = current, "no note follows; ending pass");
            break;
        };
        let Some(next) = degree_at(line, next_slot, scale) else {
            continue;
        };
        if !wanted.contains(&next) {
            continue;
        }

        let (slot, target) = if current == 1 {
            (next_slot, 6)
        } else {
            (current_slot, 3)
        };
        if let Some(note) = line.note_mut(slot) {
            if relocate(note, scale, target) {
                changed += 1;
            }
        }
    }
    Ok(changed)
}
