// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory score model.
//!
//! A `Score` owns parts, a part owns measures, and a measure owns an
//! offset-ordered list of notes, rests and tempo markings. Durations and
//! offsets are exact quarter lengths.

pub mod analysis;
pub mod line;
pub mod midi;
pub mod musicxml;

pub use analysis::{FixedKey, KeyDetector, KrumhanslDetector};
pub use line::{Line, NoteSlot};

use std::path::Path;

use num_rational::Rational64;

use crate::error::{EmotionError, Result};
use crate::music::Pitch;

/// Duration or offset in quarter notes
pub type QuarterLength = Rational64;

/// Quarter length from a whole number of quarters
pub fn ql(quarters: i64) -> QuarterLength {
    QuarterLength::from_integer(quarters)
}

/// Quarter length from a fraction
pub fn ql_frac(numer: i64, denom: i64) -> QuarterLength {
    QuarterLength::new(numer, denom)
}

/// Quarter length from a decimal, snapped to a 1/960 grid
pub fn ql_from_f64(quarters: f64) -> QuarterLength {
    QuarterLength::new((quarters * 960.0).round() as i64, 960)
}

/// File format a score was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Midi,
    MusicXml,
}

impl SourceFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mid" | "midi" => Some(SourceFormat::Midi),
            "xml" | "musicxml" => Some(SourceFormat::MusicXml),
            _ => None,
        }
    }
}

/// Load a score, choosing the reader from the file extension
pub fn load<P: AsRef<Path>>(path: P) -> Result<Score> {
    let path = path.as_ref();
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Midi) => midi::read_file(path),
        Some(SourceFormat::MusicXml) => musicxml::read_file(path),
        None => Err(EmotionError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }

    /// Compound meters (6/8, 9/8, 12/8) count dotted beats
    pub fn is_compound(&self) -> bool {
        self.denominator >= 8 && self.numerator > 3 && self.numerator % 3 == 0
    }

    /// Length of one beat in quarters
    pub fn beat_length(&self) -> QuarterLength {
        let unit = ql_frac(4, self.denominator as i64);
        if self.is_compound() {
            unit * 3
        } else {
            unit
        }
    }

    /// Length of a full measure in quarters
    pub fn measure_length(&self) -> QuarterLength {
        ql_frac(4 * self.numerator as i64, self.denominator as i64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

/// Clef as written in the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clef {
    pub sign: String,
    pub line: Option<u8>,
}

/// Attributes that may change at the start of a measure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureAttributes {
    pub key_fifths: Option<i32>,
    pub key_mode: Option<crate::music::Mode>,
    pub time: Option<TimeSignature>,
    pub clef: Option<Clef>,
}

impl MeasureAttributes {
    pub fn is_empty(&self) -> bool {
        self.key_fifths.is_none() && self.time.is_none() && self.clef.is_none()
    }
}

/// Tie flags; a note in the middle of a tied chain has both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tie {
    pub start: bool,
    pub stop: bool,
}

impl Tie {
    pub fn is_tied(&self) -> bool {
        self.start || self.stop
    }
}

/// An XML element carried through unchanged (articulations, slurs, lyrics)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// This element or any descendant has the given name
    pub fn contains(&self, name: &str) -> bool {
        self.name == name || self.children.iter().any(|c| c.contains(name))
    }
}

/// Notation that rides along with a note but is never transformed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    /// Children of `<notations>` other than ties
    pub notations: Vec<Fragment>,
    /// `<lyric>` elements
    pub lyrics: Vec<Fragment>,
}

impl Markup {
    pub fn is_empty(&self) -> bool {
        self.notations.is_empty() && self.lyrics.is_empty()
    }
}

/// A pitch sounding together with a melody note; rules never touch it
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTone {
    pub pitch: Pitch,
    pub tie: Tie,
    pub markup: Markup,
}

impl ChordTone {
    pub fn new(pitch: Pitch) -> Self {
        Self {
            pitch,
            tie: Tie::default(),
            markup: Markup::default(),
        }
    }
}

/// A pitched note
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub pitch: Pitch,
    pub duration: QuarterLength,
    /// Position within the owning measure
    pub offset: QuarterLength,
    pub tie: Tie,
    pub markup: Markup,
    /// Other pitches of a chord this note is the lead of
    pub chord: Vec<ChordTone>,
}

impl Note {
    pub fn new(pitch: Pitch, duration: QuarterLength, offset: QuarterLength) -> Self {
        Self {
            pitch,
            duration,
            offset,
            tie: Tie::default(),
            markup: Markup::default(),
            chord: Vec::new(),
        }
    }

    pub fn with_tie(mut self, tie: Tie) -> Self {
        self.tie = tie;
        self
    }

    /// 1-indexed beat within the measure (fractional between beats)
    pub fn beat(&self, time: TimeSignature) -> QuarterLength {
        ql(1) + self.offset / time.beat_length()
    }

    /// True when the note starts exactly on the downbeat
    pub fn is_on_first_beat(&self, time: TimeSignature) -> bool {
        self.beat(time) == ql(1)
    }
}

/// Metronome mark in quarter-note beats per minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoMarking {
    pub bpm: f64,
}

impl TempoMarking {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    pub fn set_quarter_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }
}

/// Anything a measure can hold
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureElement {
    Note(Note),
    Rest {
        duration: QuarterLength,
        offset: QuarterLength,
    },
    Tempo {
        marking: TempoMarking,
        offset: QuarterLength,
    },
}

impl MeasureElement {
    pub fn offset(&self) -> QuarterLength {
        match self {
            MeasureElement::Note(note) => note.offset,
            MeasureElement::Rest { offset, .. } | MeasureElement::Tempo { offset, .. } => *offset,
        }
    }

    /// Time the element occupies (zero for tempo markings)
    pub fn duration(&self) -> QuarterLength {
        match self {
            MeasureElement::Note(note) => note.duration,
            MeasureElement::Rest { duration, .. } => *duration,
            MeasureElement::Tempo { .. } => ql(0),
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            MeasureElement::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_note_mut(&mut self) -> Option<&mut Note> {
        match self {
            MeasureElement::Note(note) => Some(note),
            _ => None,
        }
    }
}

/// One bar of music
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub number: u32,
    pub attributes: MeasureAttributes,
    pub elements: Vec<MeasureElement>,
}

impl Measure {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            attributes: MeasureAttributes::default(),
            elements: Vec::new(),
        }
    }

    /// Append an element (caller keeps offsets ordered)
    pub fn push(&mut self, element: MeasureElement) {
        self.elements.push(element);
    }

    /// Insert keeping offset order; lands after anything already at the same offset
    pub fn insert(&mut self, element: MeasureElement) -> usize {
        let offset = element.offset();
        let index = self
            .elements
            .iter()
            .position(|e| e.offset() > offset)
            .unwrap_or(self.elements.len());
        self.elements.insert(index, element);
        index
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.elements.iter().filter_map(MeasureElement::as_note)
    }
}

/// A single instrument line
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            measures: Vec::new(),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.measures.iter().flat_map(Measure::notes)
    }

    pub fn note_count(&self) -> usize {
        self.notes().count()
    }

    /// First tempo marking in the part
    pub fn tempo_marking(&self) -> Option<&TempoMarking> {
        self.measures
            .iter()
            .flat_map(|m| m.elements.iter())
            .find_map(|e| match e {
                MeasureElement::Tempo { marking, .. } => Some(marking),
                _ => None,
            })
    }

    pub fn tempo_marking_mut(&mut self) -> Option<&mut TempoMarking> {
        self.measures
            .iter_mut()
            .flat_map(|m| m.elements.iter_mut())
            .find_map(|e| match e {
                MeasureElement::Tempo { marking, .. } => Some(marking),
                _ => None,
            })
    }

    /// Time signature in force at each measure (carried forward, 4/4 until set)
    pub fn time_signatures(&self) -> Vec<TimeSignature> {
        let mut current = TimeSignature::default();
        self.measures
            .iter()
            .map(|m| {
                if let Some(time) = m.attributes.time {
                    current = time;
                }
                current
            })
            .collect()
    }

    /// Absolute start of each measure in quarters
    pub fn measure_starts(&self) -> Vec<QuarterLength> {
        let mut start = ql(0);
        self.time_signatures()
            .into_iter()
            .map(|time| {
                let this = start;
                start += time.measure_length();
                this
            })
            .collect()
    }
}

/// A parsed score
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub title: Option<String>,
    pub source: SourceFormat,
    pub parts: Vec<Part>,
}

impl Score {
    pub fn new(source: SourceFormat) -> Self {
        Self {
            title: None,
            source,
            parts: Vec::new(),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.parts.iter().flat_map(Part::notes)
    }

    pub fn note_count(&self) -> usize {
        self.notes().count()
    }
}
