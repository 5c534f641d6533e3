// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MusicXML (score-partwise) reading and writing.
//!
//! This is the interchange format handed to the harmonizer, so the writer
//! places every element at its exact offset: overlaps become `<backup>` and
//! gaps become `<forward>`, which keeps inserted and shortened notes where
//! the rules put them.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use crate::error::{EmotionError, Result};
use crate::music::{Mode, Pitch, Step};

use super::{
    ql, ChordTone, Clef, Fragment, Markup, Measure, MeasureAttributes, MeasureElement, Note, Part,
    QuarterLength, Score, SourceFormat, TempoMarking, Tie, TimeSignature,
};

const DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a MusicXML file from disk
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Score> {
    let xml = fs::read_to_string(path.as_ref())?;
    read_str(&xml)
}

/// Parse a score-partwise document
pub fn read_str(xml: &str) -> Result<Score> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(xml, options).map_err(|e| EmotionError::parse("musicxml", e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(EmotionError::parse(
            "musicxml",
            format!("expected <score-partwise>, found <{}>", root.tag_name().name()),
        ));
    }

    let mut score = Score::new(SourceFormat::MusicXml);
    score.title = child(root, "work")
        .and_then(|work| child_text(work, "work-title"))
        .or_else(|| child_text(root, "movement-title"))
        .map(str::to_string);

    let part_names: Vec<(String, String)> = child(root, "part-list")
        .into_iter()
        .flat_map(|list| list.children().filter(|n| n.has_tag_name("score-part")))
        .filter_map(|sp| {
            let id = sp.attribute("id")?.to_string();
            let name = child_text(sp, "part-name").unwrap_or_default().to_string();
            Some((id, name))
        })
        .collect();

    for part_node in root.children().filter(|n| n.has_tag_name("part")) {
        let id = part_node
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("P{}", score.parts.len() + 1));
        let name = part_names
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        score.parts.push(read_part(part_node, id, name)?);
    }

    debug!(parts = score.parts.len(), notes = score.note_count(), "parsed musicxml");
    Ok(score)
}

fn read_part(node: Node, id: String, name: String) -> Result<Part> {
    let mut part = Part::new(id, name);
    let mut divisions: i64 = 1;

    for (index, measure_node) in node.children().filter(|n| n.has_tag_name("measure")).enumerate() {
        let number = measure_node
            .attribute("number")
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(index as u32 + 1);
        let mut measure = Measure::new(number);
        let mut position = ql(0);
        // Element index of the note a `<chord/>` member belongs to
        let mut lead: Option<usize> = None;

        for child_node in measure_node.children().filter(Node::is_element) {
            match child_node.tag_name().name() {
                "attributes" => {
                    if let Some(d) = child_text(child_node, "divisions") {
                        divisions = parse_number::<i64>("divisions", d)?.max(1);
                    }
                    read_attributes(child_node, &mut measure.attributes)?;
                }
                "note" => {
                    if child(child_node, "grace").is_some() {
                        continue;
                    }
                    if child(child_node, "chord").is_some() {
                        let Some(pitch_node) = child(child_node, "pitch") else {
                            continue;
                        };
                        let tone = ChordTone {
                            pitch: read_pitch(pitch_node)?,
                            tie: read_tie(child_node),
                            markup: read_markup(child_node),
                        };
                        let lead_note = lead
                            .and_then(|i| measure.elements.get_mut(i))
                            .and_then(MeasureElement::as_note_mut);
                        match lead_note {
                            Some(note) => note.chord.push(tone),
                            None => debug!(measure = number, "chord member without a lead note"),
                        }
                        continue;
                    }

                    let duration = read_duration(child_node, divisions)?;
                    if child(child_node, "rest").is_some() {
                        measure.push(MeasureElement::Rest {
                            duration,
                            offset: position,
                        });
                        lead = None;
                    } else if let Some(pitch_node) = child(child_node, "pitch") {
                        let mut note = Note::new(read_pitch(pitch_node)?, duration, position);
                        note.tie = read_tie(child_node);
                        note.markup = read_markup(child_node);
                        lead = Some(measure.elements.len());
                        measure.push(MeasureElement::Note(note));
                    }
                    position += duration;
                }
                "backup" => {
                    position -= read_duration(child_node, divisions)?;
                    if position < ql(0) {
                        position = ql(0);
                    }
                }
                "forward" => position += read_duration(child_node, divisions)?,
                "direction" => {
                    if let Some(bpm) = direction_tempo(child_node) {
                        measure.push(MeasureElement::Tempo {
                            marking: TempoMarking::new(bpm),
                            offset: position,
                        });
                    }
                }
                "sound" => {
                    if let Some(bpm) = child_node.attribute("tempo").and_then(|t| t.parse().ok()) {
                        measure.push(MeasureElement::Tempo {
                            marking: TempoMarking::new(bpm),
                            offset: position,
                        });
                    }
                }
                _ => {}
            }
        }

        measure.elements.sort_by(|a, b| a.offset().cmp(&b.offset()));
        part.measures.push(measure);
    }

    Ok(part)
}

fn read_attributes(node: Node, attributes: &mut MeasureAttributes) -> Result<()> {
    if let Some(key) = child(node, "key") {
        if let Some(fifths) = child_text(key, "fifths") {
            attributes.key_fifths = Some(parse_number("fifths", fifths)?);
            attributes.key_mode = child_text(key, "mode").and_then(Mode::from_str);
        }
    }
    if let Some(time) = child(node, "time") {
        if let (Some(beats), Some(beat_type)) = (child_text(time, "beats"), child_text(time, "beat-type")) {
            attributes.time = Some(TimeSignature::new(
                parse_number("beats", beats)?,
                parse_number("beat-type", beat_type)?,
            ));
        }
    }
    if let Some(clef) = child(node, "clef") {
        attributes.clef = Some(Clef {
            sign: child_text(clef, "sign").unwrap_or("G").to_string(),
            line: child_text(clef, "line").and_then(|l| l.parse().ok()),
        });
    }
    Ok(())
}

fn read_pitch(node: Node) -> Result<Pitch> {
    let step_text = child_text(node, "step").ok_or_else(|| EmotionError::parse("pitch", "missing <step>"))?;
    let step = step_text
        .chars()
        .next()
        .and_then(Step::from_char)
        .ok_or_else(|| EmotionError::parse("step", step_text))?;
    let alter = match child_text(node, "alter") {
        Some(a) => parse_number::<f64>("alter", a)?.round() as i8,
        None => 0,
    };
    let octave_text = child_text(node, "octave").ok_or_else(|| EmotionError::parse("pitch", "missing <octave>"))?;
    Ok(Pitch::new(step, alter, parse_number("octave", octave_text)?))
}

/// `<tie>` carries the sound; `<notations><tied>` is the fallback
fn read_tie(node: Node) -> Tie {
    let mut ties: Vec<&str> = node
        .children()
        .filter(|n| n.has_tag_name("tie"))
        .filter_map(|n| n.attribute("type"))
        .collect();
    if ties.is_empty() {
        ties = node
            .children()
            .filter(|n| n.has_tag_name("notations"))
            .flat_map(|n| n.children().filter(|t| t.has_tag_name("tied")))
            .filter_map(|n| n.attribute("type"))
            .collect();
    }
    Tie {
        start: ties.contains(&"start"),
        stop: ties.contains(&"stop"),
    }
}

fn read_markup(node: Node) -> Markup {
    Markup {
        notations: node
            .children()
            .filter(|n| n.has_tag_name("notations"))
            .flat_map(|n| n.children().filter(Node::is_element))
            .filter(|n| !n.has_tag_name("tied"))
            .map(read_fragment)
            .collect(),
        lyrics: node
            .children()
            .filter(|n| n.has_tag_name("lyric"))
            .map(read_fragment)
            .collect(),
    }
}

fn read_fragment(node: Node) -> Fragment {
    Fragment {
        name: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect(),
        text: node
            .children()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string),
        children: node.children().filter(Node::is_element).map(read_fragment).collect(),
    }
}

fn read_duration(node: Node, divisions: i64) -> Result<QuarterLength> {
    let text = child_text(node, "duration").unwrap_or("0");
    let value: i64 = parse_number("duration", text)?;
    Ok(QuarterLength::new(value, divisions))
}

/// Quarter-note tempo from a `<direction>`; `<sound tempo>` wins over `<metronome>`
fn direction_tempo(node: Node) -> Option<f64> {
    if let Some(bpm) = node
        .descendants()
        .find(|n| n.has_tag_name("sound"))
        .and_then(|s| s.attribute("tempo"))
        .and_then(|t| t.parse().ok())
    {
        return Some(bpm);
    }

    let metronome = node.descendants().find(|n| n.has_tag_name("metronome"))?;
    let per_minute: f64 = child_text(metronome, "per-minute")?.parse().ok()?;
    let unit = match child_text(metronome, "beat-unit")? {
        "whole" => 4.0,
        "half" => 2.0,
        "quarter" => 1.0,
        "eighth" => 0.5,
        "16th" => 0.25,
        _ => return None,
    };
    let dotted = if child(metronome, "beat-unit-dot").is_some() { 1.5 } else { 1.0 };
    Some(per_minute * unit * dotted)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

fn parse_number<T: std::str::FromStr>(what: &'static str, text: &str) -> Result<T> {
    text.trim().parse().map_err(|_| EmotionError::parse(what, text))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize a score to a MusicXML string
pub fn write_string(score: &Score) -> Result<String> {
    let mut out = XmlOut::new();
    out.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    out.writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

    out.start("score-partwise", &[("version", "3.1")])?;
    if let Some(title) = &score.title {
        out.start("work", &[])?;
        out.text_element("work-title", title)?;
        out.end("work")?;
    }

    out.start("part-list", &[])?;
    for part in &score.parts {
        out.start("score-part", &[("id", part.id.as_str())])?;
        out.text_element("part-name", &part.name)?;
        out.end("score-part")?;
    }
    out.end("part-list")?;

    for part in &score.parts {
        write_part(&mut out, part)?;
    }

    out.end("score-partwise")?;
    out.finish()
}

/// Serialize a score to a MusicXML file
pub fn write_file<P: AsRef<Path>>(score: &Score, path: P) -> Result<()> {
    let xml = write_string(score)?;
    fs::write(path.as_ref(), xml)?;
    Ok(())
}

fn write_part(out: &mut XmlOut, part: &Part) -> Result<()> {
    let divisions = part_divisions(part);
    out.start("part", &[("id", part.id.as_str())])?;

    for (index, measure) in part.measures.iter().enumerate() {
        let number = measure.number.to_string();
        out.start("measure", &[("number", number.as_str())])?;

        if index == 0 || !measure.attributes.is_empty() {
            write_attributes(out, &measure.attributes, (index == 0).then_some(divisions))?;
        }

        let mut position = ql(0);
        for element in &measure.elements {
            let offset = element.offset();
            if offset > position {
                out.start("forward", &[])?;
                out.text_element("duration", &to_divisions(offset - position, divisions))?;
                out.end("forward")?;
            } else if offset < position {
                out.start("backup", &[])?;
                out.text_element("duration", &to_divisions(position - offset, divisions))?;
                out.end("backup")?;
            }

            match element {
                MeasureElement::Note(note) => {
                    write_pitched(out, &note.pitch, note.tie, &note.markup, false, note.duration, divisions)?;
                    for tone in &note.chord {
                        write_pitched(out, &tone.pitch, tone.tie, &tone.markup, true, note.duration, divisions)?;
                    }
                }
                MeasureElement::Rest { duration, .. } => write_rest(out, *duration, divisions)?,
                MeasureElement::Tempo { marking, .. } => write_tempo(out, marking)?,
            }
            position = offset + element.duration();
        }

        out.end("measure")?;
    }

    out.end("part")
}

fn write_attributes(out: &mut XmlOut, attributes: &MeasureAttributes, divisions: Option<i64>) -> Result<()> {
    out.start("attributes", &[])?;
    if let Some(divisions) = divisions {
        out.text_element("divisions", &divisions.to_string())?;
    }
    if let Some(fifths) = attributes.key_fifths {
        out.start("key", &[])?;
        out.text_element("fifths", &fifths.to_string())?;
        if let Some(mode) = attributes.key_mode {
            out.text_element("mode", mode.name())?;
        }
        out.end("key")?;
    }
    if let Some(time) = attributes.time {
        out.start("time", &[])?;
        out.text_element("beats", &time.numerator.to_string())?;
        out.text_element("beat-type", &time.denominator.to_string())?;
        out.end("time")?;
    }
    if let Some(clef) = &attributes.clef {
        out.start("clef", &[])?;
        out.text_element("sign", &clef.sign)?;
        if let Some(line) = clef.line {
            out.text_element("line", &line.to_string())?;
        }
        out.end("clef")?;
    }
    out.end("attributes")
}

fn write_rest(out: &mut XmlOut, duration: QuarterLength, divisions: i64) -> Result<()> {
    out.start("note", &[])?;
    out.empty("rest")?;
    out.text_element("duration", &to_divisions(duration, divisions))?;
    write_voice_and_type(out, duration)?;
    out.end("note")
}

/// A pitched `<note>`; chord members carry `<chord/>` and share the lead's duration
fn write_pitched(
    out: &mut XmlOut,
    pitch: &Pitch,
    tie: Tie,
    markup: &Markup,
    chord: bool,
    duration: QuarterLength,
    divisions: i64,
) -> Result<()> {
    out.start("note", &[])?;
    if chord {
        out.empty("chord")?;
    }
    out.start("pitch", &[])?;
    out.text_element("step", pitch.step.as_str())?;
    if pitch.alter != 0 {
        out.text_element("alter", &pitch.alter.to_string())?;
    }
    out.text_element("octave", &pitch.octave.to_string())?;
    out.end("pitch")?;
    out.text_element("duration", &to_divisions(duration, divisions))?;
    for kind in tie_kinds(tie) {
        out.empty_with("tie", &[("type", kind)])?;
    }
    write_voice_and_type(out, duration)?;

    if tie.is_tied() || !markup.notations.is_empty() {
        out.start("notations", &[])?;
        for kind in tie_kinds(tie) {
            out.empty_with("tied", &[("type", kind)])?;
        }
        for fragment in &markup.notations {
            write_fragment(out, fragment)?;
        }
        out.end("notations")?;
    }
    for lyric in &markup.lyrics {
        write_fragment(out, lyric)?;
    }
    out.end("note")
}

fn write_voice_and_type(out: &mut XmlOut, duration: QuarterLength) -> Result<()> {
    out.text_element("voice", "1")?;
    if let Some((name, dots)) = note_type(duration) {
        out.text_element("type", name)?;
        for _ in 0..dots {
            out.empty("dot")?;
        }
    }
    Ok(())
}

/// Stop comes before start, as notation software writes them
fn tie_kinds(tie: Tie) -> impl Iterator<Item = &'static str> {
    [(tie.stop, "stop"), (tie.start, "start")]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
}

fn write_fragment(out: &mut XmlOut, fragment: &Fragment) -> Result<()> {
    let attributes: Vec<(&str, &str)> = fragment
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if fragment.text.is_none() && fragment.children.is_empty() {
        return out.empty_with(&fragment.name, &attributes);
    }
    out.start(&fragment.name, &attributes)?;
    if let Some(text) = &fragment.text {
        out.text(text)?;
    }
    for child in &fragment.children {
        write_fragment(out, child)?;
    }
    out.end(&fragment.name)
}

fn write_tempo(out: &mut XmlOut, marking: &TempoMarking) -> Result<()> {
    let bpm = format_bpm(marking.bpm);
    out.start("direction", &[("placement", "above")])?;
    out.start("direction-type", &[])?;
    out.start("metronome", &[])?;
    out.text_element("beat-unit", "quarter")?;
    out.text_element("per-minute", &bpm)?;
    out.end("metronome")?;
    out.end("direction-type")?;
    out.empty_with("sound", &[("tempo", bpm.as_str())])?;
    out.end("direction")
}

/// Notated type and dot count for common durations
fn note_type(duration: QuarterLength) -> Option<(&'static str, u8)> {
    const TYPES: [(i64, i64, &str); 7] = [
        (4, 1, "whole"),
        (2, 1, "half"),
        (1, 1, "quarter"),
        (1, 2, "eighth"),
        (1, 4, "16th"),
        (1, 8, "32nd"),
        (1, 16, "64th"),
    ];
    TYPES.iter().find_map(|&(n, d, name)| {
        let base = QuarterLength::new(n, d);
        if duration == base {
            Some((name, 0))
        } else if duration == base * QuarterLength::new(3, 2) {
            Some((name, 1))
        } else {
            None
        }
    })
}

fn format_bpm(bpm: f64) -> String {
    if bpm.fract() == 0.0 {
        format!("{}", bpm as i64)
    } else {
        format!("{:.2}", bpm)
    }
}

fn to_divisions(length: QuarterLength, divisions: i64) -> String {
    (length * divisions).to_integer().to_string()
}

/// Smallest divisions value that expresses every duration and offset exactly
fn part_divisions(part: &Part) -> i64 {
    part.measures
        .iter()
        .flat_map(|m| m.elements.iter())
        .flat_map(|e| [*e.duration().denom(), *e.offset().denom()])
        .fold(1, lcm)
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return a.max(b).max(1);
    }
    (a / gcd(a, b) * b).abs()
}

/// Thin helper over `quick_xml::Writer` for element-at-a-time output
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for &attribute in attributes {
            start.push_attribute(attribute);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str) -> Result<()> {
        self.empty_with(name, &[])
    }

    fn empty_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for &attribute in attributes {
            start.push_attribute(attribute);
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name, &[])?;
        self.text(text)?;
        self.end(name)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| EmotionError::parse("musicxml output", e.to_string()))
    }
}
