// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Post-processing of harmonizer output.
//!
//! The harmonizer drops the part's `<midi-instrument>` and any tempo
//! marking. Both are put back here before the result is rendered to MIDI.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};

use crate::emotion::Emotion;
use crate::error::{EmotionError, Result};
use crate::score::midi::MidiExporter;
use crate::score::{musicxml, ql, MeasureElement, Score, TempoMarking};

/// Insert a `<midi-instrument>` (channel 1, program 1) as the first child
/// of the first `<score-part>`
pub fn patch_midi_instrument(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut patched = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) if !patched && start.name().as_ref() == b"score-part" => {
                writer.write_event(Event::Start(start))?;
                write_instrument(&mut writer)?;
                patched = true;
            }
            Event::Empty(start) if !patched && start.name().as_ref() == b"score-part" => {
                writer.write_event(Event::Start(start))?;
                write_instrument(&mut writer)?;
                writer.write_event(Event::End(BytesEnd::new("score-part")))?;
                patched = true;
            }
            event => writer.write_event(event)?,
        }
    }

    if !patched {
        return Err(EmotionError::MalformedScore("no <score-part> in part list".into()));
    }
    String::from_utf8(writer.into_inner()).map_err(|e| EmotionError::parse("patched xml", e.to_string()))
}

fn write_instrument<W: Write>(writer: &mut Writer<W>) -> quick_xml::Result<()> {
    let mut start = BytesStart::new("midi-instrument");
    start.push_attribute(("id", "id111"));
    writer.write_event(Event::Start(start))?;
    for (name, value) in [("midi-channel", "1"), ("midi-program", "1")] {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("midi-instrument")))
}

/// Set the downbeat tempo of the first measure, adding a marking if there is none
pub fn restore_tempo(score: &mut Score, bpm: f64) -> bool {
    let Some(measure) = score.parts.first_mut().and_then(|p| p.measures.first_mut()) else {
        return false;
    };

    let existing = measure.elements.iter_mut().find_map(|e| match e {
        MeasureElement::Tempo { marking, offset } if *offset == ql(0) => Some(marking),
        _ => None,
    });
    match existing {
        Some(marking) => marking.set_quarter_bpm(bpm),
        None => measure.elements.insert(
            0,
            MeasureElement::Tempo {
                marking: TempoMarking::new(bpm),
                offset: ql(0),
            },
        ),
    }
    debug!(bpm, "restored tempo");
    true
}

/// Patch a harmonized MusicXML file in place and render it next to itself as `.mid`
pub fn finish_harmonized(xml_path: &Path, emotion: Emotion, restored_bpm: f64) -> Result<PathBuf> {
    let xml = fs::read_to_string(xml_path)?;
    let patched = patch_midi_instrument(&xml)?;
    fs::write(xml_path, &patched)?;

    let mut score = musicxml::read_str(&patched)?;
    if emotion.is_tempo_slowed() {
        restore_tempo(&mut score, restored_bpm);
    }

    let midi_path = xml_path.with_extension("mid");
    MidiExporter::from_score(&score).export(&midi_path)?;
    info!(path = %midi_path.display(), parts = score.parts.len(), "wrote harmonized midi");
    Ok(midi_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::midi;

    const CHORALE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <part-list>
    <score-part id="P1">
      <part-name>Soprano</part-name>
    </score-part>
    <score-part id="P2">
      <part-name>Bass</part-name>
    </score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>E</step><octave>5</octave></pitch><duration>2</duration></note>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration></note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>2</duration></note>
      <note><pitch><step>G</step><octave>2</octave></pitch><duration>2</duration></note>
    </measure>
  </part>
</score-partwise>
"#;

    #[test]
    fn test_patch_inserts_first_child_once() {
        let patched = patch_midi_instrument(CHORALE).unwrap();
        assert_eq!(patched.matches("<midi-instrument").count(), 1);

        let inserted = r#"<score-part id="P1"><midi-instrument id="id111"><midi-channel>1</midi-channel><midi-program>1</midi-program></midi-instrument>"#;
        assert!(patched.contains(inserted), "{}", patched);
        // Everything else passes through
        assert!(patched.contains("<part-name>Bass</part-name>"));
        assert!(patched.starts_with("<?xml"));
    }

    #[test]
    fn test_patch_expands_empty_score_part() {
        let xml = r#"<score-partwise><part-list><score-part id="P1"/></part-list></score-partwise>"#;
        let patched = patch_midi_instrument(xml).unwrap();
        assert!(patched.contains(r#"<midi-program>1</midi-program></midi-instrument></score-part>"#));
    }

    #[test]
    fn test_patch_requires_score_part() {
        let err = patch_midi_instrument("<score-partwise><part-list/></score-partwise>").unwrap_err();
        assert!(matches!(err, EmotionError::MalformedScore(_)));
    }

    #[test]
    fn test_restore_tempo_inserts_or_rewrites() {
        let mut score = musicxml::read_str(CHORALE).unwrap();
        assert!(restore_tempo(&mut score, 80.0));
        let first = &score.parts[0].measures[0].elements[0];
        assert!(matches!(first, MeasureElement::Tempo { marking, .. } if marking.bpm == 80.0));

        restore_tempo(&mut score, 72.0);
        let tempos = score.parts[0].measures[0]
            .elements
            .iter()
            .filter(|e| matches!(e, MeasureElement::Tempo { .. }))
            .count();
        assert_eq!(tempos, 1);
        assert_eq!(score.parts[0].tempo_marking().unwrap().bpm, 72.0);
    }

    #[test]
    fn test_finish_harmonized_writes_midi() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("ode_AWE_1_harm.xml");
        fs::write(&xml_path, CHORALE).unwrap();

        let midi_path = finish_harmonized(&xml_path, Emotion::Awe, 80.0).unwrap();
        assert_eq!(midi_path, dir.path().join("ode_AWE_1_harm.mid"));
        assert!(fs::read_to_string(&xml_path).unwrap().contains("<midi-instrument"));

        let score = midi::read_file(&midi_path).unwrap();
        assert_eq!(score.parts.len(), 2);
        assert!((score.parts[0].tempo_marking().unwrap().bpm - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_finish_harmonized_keeps_default_tempo_for_other_emotions() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("ode_JOY_1_harm.xml");
        fs::write(&xml_path, CHORALE).unwrap();

        let midi_path = finish_harmonized(&xml_path, Emotion::Joy, 80.0).unwrap();
        let score = midi::read_file(&midi_path).unwrap();
        assert!((score.parts[0].tempo_marking().unwrap().bpm - midi::DEFAULT_BPM).abs() < 0.01);
    }
}
