// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file import and export.
//!
//! Import turns each note-bearing track into a part, bars it by the first
//! time signature, fills gaps with rests and spells pitches for the key the
//! notes imply. Export writes Type 0 or Type 1 files with a tempo map.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, warn};

use crate::error::Result;
use crate::music::Pitch;

use super::{
    ql, Clef, KeyDetector, KrumhanslDetector, Measure, MeasureElement, Note, Part, QuarterLength,
    Score, SourceFormat, TempoMarking, Tie, TimeSignature,
};

/// Tempo used when a file carries no tempo event
pub const DEFAULT_BPM: f64 = 120.0;

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// A note as it appears in the file, in ticks
#[derive(Debug, Clone, Copy)]
struct RawNote {
    start: u64,
    end: u64,
    key: u8,
}

/// Read a MIDI file from disk
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Score> {
    let bytes = fs::read(path.as_ref())?;
    read_bytes(&bytes)
}

/// Parse MIDI bytes into a score
pub fn read_bytes(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes)?;

    let mut tempo: Option<f64> = None;
    let mut time: Option<TimeSignature> = None;
    let mut tracks: Vec<(String, Vec<RawNote>)> = Vec::new();

    for (index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut pending: HashMap<(u8, u8), u64> = HashMap::new();
        let mut notes = Vec::new();
        let mut name = format!("Track {}", index + 1);

        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        pending.insert((channel.as_int(), key.as_int()), tick);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some(start) = pending.remove(&(channel.as_int(), key.as_int())) {
                            notes.push(RawNote {
                                start,
                                end: tick,
                                key: key.as_int(),
                            });
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) if tempo.is_none() => {
                    tempo = Some(60_000_000.0 / micros.as_int().max(1) as f64);
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, power, _, _)) if time.is_none() => {
                    time = Some(TimeSignature::new(numerator, 1u8 << power.min(6)));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                    name = String::from_utf8_lossy(bytes).trim().to_string();
                }
                _ => {}
            }
        }

        if !notes.is_empty() {
            notes.sort_by_key(|n| (n.start, n.key));
            tracks.push((name, notes));
        }
    }

    let ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int().max(1) as i64,
        Timing::Timecode(fps, subframes) => {
            let bpm = tempo.unwrap_or(DEFAULT_BPM);
            let ppq = timecode_ppq(fps.as_f32() as f64, subframes, bpm);
            warn!(
                fps = fps.as_f32(),
                subframes,
                bpm,
                ppq,
                "timecode division converted at the opening tempo"
            );
            ppq
        }
    };

    let time = time.unwrap_or_default();
    let mut score = Score::new(SourceFormat::Midi);
    for (index, (name, notes)) in tracks.iter().enumerate() {
        let part = build_part(format!("P{}", index + 1), name.clone(), notes, ppq, time, tempo);
        score.parts.push(part);
    }

    respell_for_key(&mut score);
    debug!(parts = score.parts.len(), notes = score.note_count(), ppq, "parsed midi");
    Ok(score)
}

/// Ticks per quarter for an SMPTE division held at a fixed tempo
fn timecode_ppq(fps: f64, subframes: u8, bpm: f64) -> i64 {
    (fps * subframes as f64 * 60.0 / bpm.max(1.0)).round().max(1.0) as i64
}

fn build_part(
    id: String,
    name: String,
    notes: &[RawNote],
    ppq: i64,
    time: TimeSignature,
    tempo: Option<f64>,
) -> Part {
    let measure_length = time.measure_length();
    let to_ql = |tick: u64| QuarterLength::new(tick as i64, ppq);

    let last_end = notes
        .iter()
        .filter(|n| n.end > n.start)
        .map(|n| to_ql(n.end))
        .max()
        .unwrap_or_else(|| ql(0));
    let measure_count = (last_end / measure_length).ceil().to_integer().max(1) as usize;

    let mut part = Part::new(id, name);
    part.measures = (0..measure_count).map(|i| Measure::new(i as u32 + 1)).collect();
    part.measures[0].attributes.time = Some(time);
    part.measures[0].attributes.clef = Some(Clef {
        sign: "G".to_string(),
        line: Some(2),
    });
    if let Some(bpm) = tempo {
        part.measures[0].push(MeasureElement::Tempo {
            marking: TempoMarking::new(bpm),
            offset: ql(0),
        });
    }

    let mut cursor = ql(0);
    for raw in notes {
        if raw.end <= raw.start {
            debug!(key = raw.key, tick = raw.start, "skipping zero-length note");
            continue;
        }
        let start = to_ql(raw.start);
        let end = to_ql(raw.end);
        fill_rests(&mut part, cursor, start, measure_length);

        // Unspelled until the key is known
        let pitch = Pitch::from_midi_sharp(raw.key as i32);
        let mut from = start;
        let mut tie = Tie::default();
        loop {
            let index = (from / measure_length).floor().to_integer() as usize;
            let measure_start = measure_length * index as i64;
            let segment_end = end.min(measure_start + measure_length);
            tie.start = segment_end < end;
            let note = Note::new(pitch, segment_end - from, from - measure_start).with_tie(tie);
            measure_at(&mut part, index).push(MeasureElement::Note(note));
            if !tie.start {
                break;
            }
            debug!(key = raw.key, measure = index + 1, "tying note across barline");
            tie.stop = true;
            from = segment_end;
        }
        cursor = cursor.max(end);
    }
    let total = measure_length * part.measures.len() as i64;
    fill_rests(&mut part, cursor, total, measure_length);

    part
}

/// Measure at `index`, appending empty measures up to it
fn measure_at(part: &mut Part, index: usize) -> &mut Measure {
    while part.measures.len() <= index {
        let number = part.measures.len() as u32 + 1;
        part.measures.push(Measure::new(number));
    }
    &mut part.measures[index]
}

/// Rests covering [from, to), split at barlines
fn fill_rests(part: &mut Part, mut from: QuarterLength, to: QuarterLength, measure_length: QuarterLength) {
    while from < to {
        let index = (from / measure_length).floor().to_integer() as usize;
        let measure_start = measure_length * index as i64;
        let segment_end = to.min(measure_start + measure_length);
        if let Some(measure) = part.measures.get_mut(index) {
            measure.push(MeasureElement::Rest {
                duration: segment_end - from,
                offset: from - measure_start,
            });
        }
        from = segment_end;
    }
}

/// MIDI has no spelling; borrow it from the key the notes imply
fn respell_for_key(score: &mut Score) {
    let key = KrumhanslDetector.detect_key(score);
    let scale = key.scale();
    for part in &mut score.parts {
        if let Some(first) = part.measures.first_mut() {
            first.attributes.key_fifths = Some(scale.fifths());
            first.attributes.key_mode = Some(key.mode);
        }
        for measure in &mut part.measures {
            for element in &mut measure.elements {
                if let MeasureElement::Note(note) = element {
                    note.pitch = scale.spell(note.pitch.midi());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// MIDI file format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MidiFileFormat {
    /// Type 0: Single track with all channels
    Type0,
    /// Type 1: Tempo track plus one track per part
    #[default]
    Type1,
}

/// A part flattened to absolute ticks
#[derive(Debug, Clone)]
pub struct ExportTrack {
    pub name: String,
    /// MIDI channel (0-15)
    pub channel: u8,
    pub program: Option<u8>,
    pub notes: Vec<ExportNote>,
}

impl ExportTrack {
    pub fn new(name: impl Into<String>, channel: u8) -> Self {
        Self {
            name: name.into(),
            channel,
            program: None,
            notes: Vec::new(),
        }
    }

    pub fn with_program(mut self, program: u8) -> Self {
        self.program = Some(program);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportNote {
    pub tick: u64,
    pub key: u8,
    pub velocity: u8,
    pub duration: u64,
}

impl ExportNote {
    pub fn end_tick(&self) -> u64 {
        self.tick + self.duration.max(1)
    }
}

/// Ordering within a tick: releases first so repeated pitches retrigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventOrder {
    Meta,
    NoteOff,
    NoteOn,
}

#[derive(Debug, Clone)]
struct SmfEvent {
    tick: u64,
    order: EventOrder,
    data: Vec<u8>,
}

impl SmfEvent {
    fn note_on(tick: u64, channel: u8, key: u8, velocity: u8) -> Self {
        Self {
            tick,
            order: EventOrder::NoteOn,
            data: vec![0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
        }
    }

    fn note_off(tick: u64, channel: u8, key: u8) -> Self {
        Self {
            tick,
            order: EventOrder::NoteOff,
            data: vec![0x80 | (channel & 0x0F), key & 0x7F, 0],
        }
    }

    fn program_change(channel: u8, program: u8) -> Self {
        Self {
            tick: 0,
            order: EventOrder::Meta,
            data: vec![0xC0 | (channel & 0x0F), program & 0x7F],
        }
    }

    fn tempo(tick: u64, bpm: f64) -> Self {
        let micros = (60_000_000.0 / bpm.max(1.0)) as u32;
        Self {
            tick,
            order: EventOrder::Meta,
            data: vec![0xFF, 0x51, 0x03, (micros >> 16) as u8, (micros >> 8) as u8, micros as u8],
        }
    }

    fn time_signature(time: TimeSignature) -> Self {
        let power = (time.denominator as f64).log2() as u8;
        Self {
            tick: 0,
            order: EventOrder::Meta,
            data: vec![0xFF, 0x58, 0x04, time.numerator, power, 24, 8],
        }
    }

    fn track_name(name: &str) -> Self {
        let bytes = &name.as_bytes()[..name.len().min(127)];
        let mut data = vec![0xFF, 0x03, bytes.len() as u8];
        data.extend_from_slice(bytes);
        Self {
            tick: 0,
            order: EventOrder::Meta,
            data,
        }
    }
}

/// Standard MIDI file writer
pub struct MidiExporter {
    format: MidiFileFormat,
    /// Ticks per quarter note
    ppqn: u16,
    /// Tempo map as (tick, quarter BPM)
    tempos: Vec<(u64, f64)>,
    time_sig: TimeSignature,
    tracks: Vec<ExportTrack>,
}

impl MidiExporter {
    pub fn new() -> Self {
        Self {
            format: MidiFileFormat::default(),
            ppqn: 480,
            tempos: Vec::new(),
            time_sig: TimeSignature::default(),
            tracks: Vec::new(),
        }
    }

    /// Exporter pre-loaded with every part, tempo marking and the opening meter
    pub fn from_score(score: &Score) -> Self {
        let mut exporter = Self::new();
        exporter.add_score(score);
        exporter
    }

    pub fn format(&self) -> MidiFileFormat {
        self.format
    }

    pub fn set_format(&mut self, format: MidiFileFormat) {
        self.format = format;
    }

    pub fn ppqn(&self) -> u16 {
        self.ppqn
    }

    pub fn set_ppqn(&mut self, ppqn: u16) {
        self.ppqn = ppqn.max(1);
    }

    pub fn tempos(&self) -> &[(u64, f64)] {
        &self.tempos
    }

    pub fn tracks(&self) -> &[ExportTrack] {
        &self.tracks
    }

    pub fn add_track(&mut self, track: ExportTrack) {
        self.tracks.push(track);
    }

    pub fn add_tempo(&mut self, tick: u64, bpm: f64) {
        self.tempos.push((tick, bpm));
        self.tempos.sort_by_key(|(t, _)| *t);
    }

    /// Flatten each part to ticks on its own channel
    pub fn add_score(&mut self, score: &Score) {
        if let Some(time) = score
            .parts
            .first()
            .and_then(|p| p.measures.first())
            .and_then(|m| m.attributes.time)
        {
            self.time_sig = time;
        }

        for part in &score.parts {
            let channel = (self.tracks.len() % 16) as u8;
            let mut track = ExportTrack::new(part.name.clone(), channel).with_program(0);
            let starts = part.measure_starts();
            // Index of the note a tie started on, per key
            let mut open: HashMap<u8, usize> = HashMap::new();

            for (measure, start) in part.measures.iter().zip(starts) {
                for element in &measure.elements {
                    let tick = self.to_ticks(start + element.offset());
                    match element {
                        MeasureElement::Note(note) => {
                            let duration = self.to_ticks(note.duration);
                            let pitches = std::iter::once((&note.pitch, note.tie))
                                .chain(note.chord.iter().map(|tone| (&tone.pitch, tone.tie)));
                            for (pitch, tie) in pitches {
                                let key = pitch.midi().clamp(0, 127) as u8;
                                Self::push_tied(&mut track, &mut open, key, tie, tick, duration);
                            }
                        }
                        MeasureElement::Tempo { marking, .. } => self.add_tempo(tick, marking.bpm),
                        MeasureElement::Rest { .. } => {}
                    }
                }
            }
            self.tracks.push(track);
        }
    }

    /// A tie stop extends the note its start opened instead of sounding again
    fn push_tied(
        track: &mut ExportTrack,
        open: &mut HashMap<u8, usize>,
        key: u8,
        tie: Tie,
        tick: u64,
        duration: u64,
    ) {
        let continued = if tie.stop { open.remove(&key) } else { None };
        let index = match continued.filter(|&i| i < track.notes.len()) {
            Some(i) => {
                let held = &mut track.notes[i];
                held.duration = (tick + duration).saturating_sub(held.tick);
                i
            }
            None => {
                track.notes.push(ExportNote {
                    tick,
                    key,
                    velocity: 90,
                    duration,
                });
                track.notes.len() - 1
            }
        };
        if tie.start {
            open.insert(key, index);
        }
    }

    fn to_ticks(&self, length: QuarterLength) -> u64 {
        (length * self.ppqn as i64).round().to_integer().max(0) as u64
    }

    fn tempo_events(&self) -> Vec<SmfEvent> {
        if self.tempos.is_empty() {
            return vec![SmfEvent::tempo(0, DEFAULT_BPM)];
        }
        self.tempos.iter().map(|&(tick, bpm)| SmfEvent::tempo(tick, bpm)).collect()
    }

    fn note_events(track: &ExportTrack) -> Vec<SmfEvent> {
        let mut events = Vec::new();
        if let Some(program) = track.program {
            events.push(SmfEvent::program_change(track.channel, program));
        }
        for note in &track.notes {
            events.push(SmfEvent::note_on(note.tick, track.channel, note.key, note.velocity));
            events.push(SmfEvent::note_off(note.end_tick(), track.channel, note.key));
        }
        events
    }

    pub fn export<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        self.write(&mut file)
    }

    pub fn export_to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self.format {
            MidiFileFormat::Type0 => {
                let mut events = self.tempo_events();
                events.push(SmfEvent::time_signature(self.time_sig));
                for track in &self.tracks {
                    events.extend(Self::note_events(track));
                }
                self.write_header(writer, 0, 1)?;
                self.write_track(writer, events)
            }
            MidiFileFormat::Type1 => {
                self.write_header(writer, 1, self.tracks.len() as u16 + 1)?;

                let mut conductor = vec![SmfEvent::track_name("Tempo"), SmfEvent::time_signature(self.time_sig)];
                conductor.extend(self.tempo_events());
                self.write_track(writer, conductor)?;

                for track in &self.tracks {
                    let mut events = vec![SmfEvent::track_name(&track.name)];
                    events.extend(Self::note_events(track));
                    self.write_track(writer, events)?;
                }
                Ok(())
            }
        }
    }

    fn write_header<W: Write>(&self, writer: &mut W, format: u16, num_tracks: u16) -> io::Result<()> {
        writer.write_all(b"MThd")?;
        writer.write_all(&6u32.to_be_bytes())?;
        writer.write_all(&format.to_be_bytes())?;
        writer.write_all(&num_tracks.to_be_bytes())?;
        writer.write_all(&self.ppqn.to_be_bytes())
    }

    fn write_track<W: Write>(&self, writer: &mut W, mut events: Vec<SmfEvent>) -> io::Result<()> {
        events.sort_by_key(|e| (e.tick, e.order));

        let mut data = Vec::new();
        let mut last_tick = 0u64;
        for event in &events {
            write_variable_length(&mut data, (event.tick - last_tick) as u32);
            data.extend_from_slice(&event.data);
            last_tick = event.tick;
        }
        write_variable_length(&mut data, 0);
        data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        writer.write_all(b"MTrk")?;
        writer.write_all(&(data.len() as u32).to_be_bytes())?;
        writer.write_all(&data)
    }
}

impl Default for MidiExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Variable-length quantity as used for delta times
fn write_variable_length(out: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    out.extend_from_slice(&bytes);
}
