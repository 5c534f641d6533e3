// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! One or more parts walked as a single line of notes.
//!
//! Notes are visited in onset order across every part. Notes that start
//! together keep part order, then their order inside the measure.

use super::{Measure, MeasureElement, Note, Part, QuarterLength, TempoMarking, TimeSignature};

/// Location of a note inside a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteSlot {
    /// Index into the line's parts
    pub part: usize,
    pub measure: usize,
    pub element: usize,
}

/// Location of a tempo marking: (part, measure, element)
type TempoSlot = (usize, usize, usize);

/// Mutable view over the parts a transformation reads and rewrites
pub struct Line<'a> {
    parts: Vec<&'a mut Part>,
}

impl<'a> Line<'a> {
    pub fn new(parts: Vec<&'a mut Part>) -> Self {
        Self { parts }
    }

    pub fn single(part: &'a mut Part) -> Self {
        Self::new(vec![part])
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Every note slot, ordered by absolute onset
    pub fn note_positions(&self) -> Vec<NoteSlot> {
        let mut slots: Vec<(QuarterLength, NoteSlot)> = Vec::new();
        for (p, part) in self.parts.iter().enumerate() {
            let starts = part.measure_starts();
            for (m, measure) in part.measures.iter().enumerate() {
                for (e, element) in measure.elements.iter().enumerate() {
                    if let MeasureElement::Note(note) = element {
                        let slot = NoteSlot {
                            part: p,
                            measure: m,
                            element: e,
                        };
                        slots.push((starts[m] + note.offset, slot));
                    }
                }
            }
        }
        // Stable: equal onsets stay in part order
        slots.sort_by_key(|(onset, _)| *onset);
        slots.into_iter().map(|(_, slot)| slot).collect()
    }

    pub fn note(&self, slot: NoteSlot) -> Option<&Note> {
        self.parts
            .get(slot.part)?
            .measures
            .get(slot.measure)?
            .elements
            .get(slot.element)?
            .as_note()
    }

    pub fn note_mut(&mut self, slot: NoteSlot) -> Option<&mut Note> {
        self.parts
            .get_mut(slot.part)?
            .measures
            .get_mut(slot.measure)?
            .elements
            .get_mut(slot.element)?
            .as_note_mut()
    }

    pub fn measure_mut(&mut self, part: usize, measure: usize) -> Option<&mut Measure> {
        self.parts.get_mut(part)?.measures.get_mut(measure)
    }

    /// Time signature in force at each measure of each part
    pub fn time_signatures(&self) -> Vec<Vec<TimeSignature>> {
        self.parts.iter().map(|p| p.time_signatures()).collect()
    }

    /// Earliest tempo marking across the parts
    fn first_tempo(&self) -> Option<TempoSlot> {
        let mut best: Option<(QuarterLength, TempoSlot)> = None;
        for (p, part) in self.parts.iter().enumerate() {
            let starts = part.measure_starts();
            let found = part.measures.iter().enumerate().find_map(|(m, measure)| {
                measure.elements.iter().enumerate().find_map(|(e, element)| match element {
                    MeasureElement::Tempo { offset, .. } => Some((starts[m] + *offset, (p, m, e))),
                    _ => None,
                })
            });
            if let Some((onset, slot)) = found {
                if best.map_or(true, |(current, _)| onset < current) {
                    best = Some((onset, slot));
                }
            }
        }
        best.map(|(_, slot)| slot)
    }

    pub fn tempo_marking(&self) -> Option<&TempoMarking> {
        let (p, m, e) = self.first_tempo()?;
        match self.parts.get(p)?.measures.get(m)?.elements.get(e)? {
            MeasureElement::Tempo { marking, .. } => Some(marking),
            _ => None,
        }
    }

    pub fn tempo_marking_mut(&mut self) -> Option<&mut TempoMarking> {
        let (p, m, e) = self.first_tempo()?;
        match self.parts.get_mut(p)?.measures.get_mut(m)?.elements.get_mut(e)? {
            MeasureElement::Tempo { marking, .. } => Some(marking),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{Pitch, Step};
    use crate::score::ql;

    fn note(step: Step, octave: i8, duration: i64, offset: i64) -> MeasureElement {
        MeasureElement::Note(Note::new(Pitch::new(step, 0, octave), ql(duration), ql(offset)))
    }

    fn steps(line: &Line) -> Vec<Step> {
        line.note_positions()
            .into_iter()
            .filter_map(|slot| line.note(slot))
            .map(|n| n.pitch.step)
            .collect()
    }

    #[test]
    fn test_positions_skip_rests_and_tempo() {
        let mut part = Part::new("P1", "Melody");
        let mut m1 = Measure::new(1);
        m1.push(MeasureElement::Tempo {
            marking: TempoMarking::new(100.0),
            offset: ql(0),
        });
        m1.push(note(Step::C, 4, 2, 0));
        m1.push(MeasureElement::Rest {
            duration: ql(2),
            offset: ql(2),
        });
        let mut m2 = Measure::new(2);
        m2.push(note(Step::D, 4, 4, 0));
        part.measures = vec![m1, m2];

        let line = Line::single(&mut part);
        let slots = line.note_positions();
        assert_eq!(
            slots,
            vec![
                NoteSlot { part: 0, measure: 0, element: 1 },
                NoteSlot { part: 0, measure: 1, element: 0 },
            ]
        );
        assert_eq!(line.note(slots[1]).unwrap().pitch.step, Step::D);
        assert_eq!(line.tempo_marking().unwrap().bpm, 100.0);
    }

    #[test]
    fn test_parts_interleave_by_onset() {
        let mut upper = Part::new("P1", "Upper");
        let mut m1 = Measure::new(1);
        m1.push(note(Step::E, 5, 2, 0));
        m1.push(note(Step::G, 5, 2, 2));
        upper.measures.push(m1);

        let mut lower = Part::new("P2", "Lower");
        let mut m1 = Measure::new(1);
        m1.push(note(Step::C, 3, 1, 0));
        m1.push(note(Step::D, 3, 1, 1));
        m1.push(note(Step::F, 3, 2, 2));
        lower.measures.push(m1);

        let line = Line::new(vec![&mut upper, &mut lower]);
        assert_eq!(line.part_count(), 2);
        assert_eq!(steps(&line), vec![Step::E, Step::C, Step::D, Step::G, Step::F]);
    }

    #[test]
    fn test_earliest_tempo_wins_across_parts() {
        let mut upper = Part::new("P1", "Upper");
        let mut m1 = Measure::new(1);
        m1.push(note(Step::C, 5, 4, 0));
        let mut m2 = Measure::new(2);
        m2.push(MeasureElement::Tempo {
            marking: TempoMarking::new(90.0),
            offset: ql(0),
        });
        upper.measures = vec![m1, m2];

        let mut lower = Part::new("P2", "Lower");
        let mut m1 = Measure::new(1);
        m1.push(MeasureElement::Tempo {
            marking: TempoMarking::new(120.0),
            offset: ql(2),
        });
        lower.measures.push(m1);

        let mut line = Line::new(vec![&mut upper, &mut lower]);
        assert_eq!(line.tempo_marking().unwrap().bpm, 120.0);
        line.tempo_marking_mut().unwrap().set_quarter_bpm(60.0);
        drop(line);
        assert_eq!(lower.tempo_marking().unwrap().bpm, 60.0);
        assert_eq!(upper.tempo_marking().unwrap().bpm, 90.0);
    }

    #[test]
    fn test_empty_line() {
        let line = Line::new(Vec::new());
        assert!(line.note_positions().is_empty());
        assert!(line.tempo_marking().is_none());
    }
}
