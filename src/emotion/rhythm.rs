// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Duration rules.
//!
//! GRATITUDE grows the part, so it reads the notes in one pass, queues
//! its echo notes and inserts them once the pass is over.

use tracing::debug;

use crate::music::Pitch;
use crate::score::{Line, MeasureElement, Note};

use super::rules::RuleSettings;

/// Counts from a GRATITUDE pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GratitudeOutcome {
    pub shortened: usize,
    pub echoes: usize,
}

/// A note waiting to be inserted into a measure
#[derive(Debug, Clone, PartialEq)]
struct Echo {
    part: usize,
    measure: usize,
    note: Note,
}

/// Halve every note no longer than the short-note threshold
pub fn determination(line: &mut Line, settings: &RuleSettings) -> usize {
    let threshold = settings.short_note();
    let mut changed = 0;
    for slot in line.note_positions() {
        if let Some(note) = line.note_mut(slot) {
            if note.duration <= threshold {
                note.duration = note.duration / 2;
                changed += 1;
            }
        }
    }
    debug!(changed, "determination");
    changed
}

/// Quarter long notes and echo the phrase's first downbeat note.
///
/// The anchor is the first note found on beat 1 while no anchor is held. A
/// long note consumes it: the note is cut to a quarter of its length and an
/// echo of the anchor pitch goes into the same measure at the echo offset.
/// A long note with no anchor is still shortened.
pub fn gratitude(line: &mut Line, settings: &RuleSettings) -> GratitudeOutcome {
    let long_note = settings.long_note();
    let times = line.time_signatures();

    let mut anchor: Option<Pitch> = None;
    let mut echoes = Vec::new();
    let mut outcome = GratitudeOutcome::default();

    for slot in line.note_positions() {
        let time = times
            .get(slot.part)
            .and_then(|t| t.get(slot.measure))
            .copied()
            .unwrap_or_default();
        let Some(note) = line.note_mut(slot) else {
            continue;
        };

        if anchor.is_none() && note.is_on_first_beat(time) {
            anchor = Some(note.pitch);
        }
        if note.duration < long_note {
            continue;
        }

        note.duration = note.duration / 4;
        outcome.shortened += 1;
        match anchor.take() {
            Some(pitch) => echoes.push(Echo {
                part: slot.part,
                measure: slot.measure,
                note: Note::new(pitch, settings.echo_length(), settings.echo_offset()),
            }),
            None => debug!(measure = slot.measure + 1, "long note without a phrase anchor"),
        }
    }

    for echo in echoes {
        debug!(measure = echo.measure + 1, pitch = %echo.note.pitch, "echo");
        if let Some(measure) = line.measure_mut(echo.part, echo.measure) {
            measure.insert(MeasureElement::Note(echo.note));
            outcome.echoes += 1;
        }
    }
    outcome
}
