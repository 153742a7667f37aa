//! Timing expansion computed directly from MEI.
//!
//! Measures are laid end to end in document order. Inside a measure every
//! layer keeps its own cursor; the measure lasts as long as its longest
//! layer (so pickups and overfull bars keep the following measures in the
//! right place), or one full bar of the current meter when nothing in it
//! carries a duration. Durations are summed as exact fractions of a whole
//! note and only converted to ticks per element.

use log::{debug, warn};
use num_rational::Ratio;
use roxmltree::{Document, Node, NodeId};
use std::collections::HashMap;

use super::element::{ElementKind, ScoreElement, Tick};
use super::mei::{element_ids, is};

/// Duration as a fraction of a whole note.
type Whole = Ratio<u64>;

const ZERO: Whole = Ratio::new_raw(0, 1);
const ONE: Whole = Ratio::new_raw(1, 1);

/// Pitch class of each diatonic step, c d e f g a b.
const STEP_PITCH_CLASS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Steps in the order sharps are added to a key signature.
const SHARP_ORDER: [usize; 7] = [3, 0, 4, 1, 5, 2, 6];
/// Steps in the order flats are added to a key signature.
const FLAT_ORDER: [usize; 7] = [6, 2, 5, 1, 4, 0, 3];

#[derive(Debug, Clone, Copy)]
struct Meter {
    count: u64,
    unit: u64,
}

impl Default for Meter {
    fn default() -> Self {
        Self { count: 4, unit: 4 }
    }
}

impl Meter {
    fn parse(count: &str, unit: &str) -> Option<Self> {
        // additive meters such as "3+2"
        let count = count
            .split('+')
            .map(|c| c.trim().parse::<u64>().ok())
            .sum::<Option<u64>>()?;
        let unit = unit.trim().parse::<u64>().ok()?;
        (count > 0 && unit > 0).then_some(Self { count, unit })
    }

    fn length(self) -> Whole {
        Ratio::new(self.count, self.unit)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KeySignature {
    alter: [i32; 7],
}

impl KeySignature {
    fn parse(sig: &str) -> Option<Self> {
        let sig = sig.trim();
        if sig == "0" {
            return Some(Self::default());
        }
        let (count, order, alter) = if let Some(count) = sig.strip_suffix('s') {
            (count, SHARP_ORDER, 1)
        } else if let Some(count) = sig.strip_suffix('f') {
            (count, FLAT_ORDER, -1)
        } else {
            return None;
        };
        let count = count.parse::<usize>().ok()?.min(7);
        let mut key = Self::default();
        for &step in &order[..count] {
            key.alter[step] = alter;
        }
        Some(key)
    }
}

struct LayerState {
    cursor: Whole,
    tuplet: Whole,
    grace: bool,
    bar: Whole,
    /// Accidentals written earlier in the measure, by (step, octave).
    accidentals: HashMap<(usize, i32), i32>,
}

struct Expansion {
    ids: HashMap<NodeId, String>,
    ticks_per_whole: Whole,
    meter: Meter,
    key: KeySignature,
    measure_start: Whole,
    elements: Vec<ScoreElement>,
}

/// Expand every note and rest of `doc` at `ppq` ticks per quarter note.
pub(crate) fn expand_document(doc: &Document, ppq: u32) -> Vec<ScoreElement> {
    let mut expansion = Expansion {
        ids: element_ids(doc),
        ticks_per_whole: Ratio::from_integer(4 * ppq as u64),
        meter: Meter::default(),
        key: KeySignature::default(),
        measure_start: ZERO,
        elements: Vec::new(),
    };
    expansion.walk(doc.root_element());
    debug!(
        "native expansion: {} elements over {} ticks",
        expansion.elements.len(),
        expansion.ticks(expansion.measure_start)
    );
    expansion.elements
}

impl Expansion {
    fn walk(&mut self, node: Node) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "scoreDef" | "staffDef" => {
                    self.apply_definition(child);
                    self.walk(child);
                }
                "meterSig" => self.apply_meter_sig(child),
                "keySig" => self.apply_key_sig(child),
                "measure" => self.measure(child),
                _ => self.walk(child),
            }
        }
    }

    fn apply_definition(&mut self, node: Node) {
        if let (Some(count), Some(unit)) = (node.attribute("meter.count"), node.attribute("meter.unit"))
            && let Some(meter) = Meter::parse(count, unit)
        {
            self.meter = meter;
        }
        if let Some(key) = node.attribute("key.sig").and_then(KeySignature::parse) {
            self.key = key;
        }
    }

    fn apply_meter_sig(&mut self, node: Node) {
        if let (Some(count), Some(unit)) = (node.attribute("count"), node.attribute("unit"))
            && let Some(meter) = Meter::parse(count, unit)
        {
            self.meter = meter;
        }
    }

    fn apply_key_sig(&mut self, node: Node) {
        if let Some(key) = node.attribute("sig").and_then(KeySignature::parse) {
            self.key = key;
        }
    }

    fn measure(&mut self, node: Node) {
        let bar = self.meter.length();
        let mut longest = ZERO;
        for layer in node.descendants().filter(|n| is(*n, "layer")) {
            let mut state = LayerState {
                cursor: ZERO,
                tuplet: ONE,
                grace: false,
                bar,
                accidentals: HashMap::new(),
            };
            self.layer_content(layer, &mut state);
            longest = longest.max(state.cursor);
        }
        self.measure_start += if longest == ZERO { bar } else { longest };
    }

    fn layer_content(&mut self, node: Node, state: &mut LayerState) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "note" => {
                    let duration = self.duration_of(child, state);
                    let grace = state.grace || child.has_attribute("grace");
                    self.note(child, state, duration, grace);
                    if !grace {
                        state.cursor += duration.unwrap_or(ZERO);
                    }
                }
                "rest" => {
                    let duration = self.duration_of(child, state);
                    self.emit(child, ElementKind::Rest, state.cursor, duration);
                    state.cursor += duration.unwrap_or(ZERO);
                }
                "chord" => self.chord(child, state),
                "space" => {
                    let duration = self.duration_of(child, state).unwrap_or(ZERO);
                    state.cursor += duration;
                }
                "mRest" | "mSpace" => state.cursor += state.bar,
                "multiRest" => {
                    let bars = child
                        .attribute("num")
                        .and_then(|n| n.trim().parse::<u64>().ok())
                        .unwrap_or(1);
                    state.cursor += state.bar * Ratio::from_integer(bars);
                }
                "tuplet" => {
                    let saved = state.tuplet;
                    if let (Some(num), Some(numbase)) =
                        (parse_count(child, "num"), parse_count(child, "numbase"))
                    {
                        state.tuplet = saved * Ratio::new(numbase, num);
                    }
                    self.layer_content(child, state);
                    state.tuplet = saved;
                }
                "graceGrp" => {
                    let saved = state.grace;
                    state.grace = true;
                    self.layer_content(child, state);
                    state.grace = saved;
                }
                "keySig" => self.apply_key_sig(child),
                _ => self.layer_content(child, state),
            }
        }
    }

    fn chord(&mut self, chord: Node, state: &mut LayerState) {
        let chord_duration = self.duration_of(chord, state);
        let grace = state.grace || chord.has_attribute("grace");
        let mut longest = chord_duration;
        for note in chord.descendants().filter(|n| is(*n, "note")) {
            let duration = self.duration_of(note, state).or(chord_duration);
            longest = longest.max(duration);
            self.note(note, state, duration, grace);
        }
        if !grace {
            state.cursor += longest.unwrap_or(ZERO);
        }
    }

    fn note(&mut self, node: Node, state: &mut LayerState, duration: Option<Whole>, grace: bool) {
        let Some(pitch) = self.contextual_pitch(node, state) else {
            warn!(
                "note `{}` has no usable pitch - skipping",
                self.ids.get(&node.id()).map_or("?", String::as_str)
            );
            return;
        };
        let duration = if grace { None } else { duration };
        self.emit(node, ElementKind::Note { pitch }, state.cursor, duration);
    }

    fn emit(&mut self, node: Node, kind: ElementKind, cursor: Whole, duration: Option<Whole>) {
        let Some(identifier) = self.ids.get(&node.id()).cloned() else {
            return;
        };
        let start = self.measure_start + cursor;
        let onset = self.ticks(start);
        let duration = duration.map(|d| self.ticks(start + d) - onset);
        self.elements.push(ScoreElement {
            identifier,
            kind,
            onset,
            duration,
        });
    }

    fn ticks(&self, position: Whole) -> Tick {
        (position * self.ticks_per_whole).round().to_integer()
    }

    fn duration_of(&self, node: Node, state: &LayerState) -> Option<Whole> {
        let base = parse_dur(node.attribute("dur")?)?;
        let dots = node
            .attribute("dots")
            .and_then(|d| d.trim().parse::<u32>().ok())
            .unwrap_or(0)
            .min(8);
        let dotted = base * Ratio::new(2u64.pow(dots + 1) - 1, 2u64.pow(dots));
        Some(dotted * state.tuplet)
    }

    fn contextual_pitch(&self, node: Node, state: &mut LayerState) -> Option<i32> {
        if let Some(pnum) = parse_pnum(node) {
            return Some(pnum);
        }
        let (step, oct) = spelled_step(node)?;
        let alter = match gestural_accid(node) {
            Some(alter) => alter,
            None => match written_accid(node) {
                Some(alter) => {
                    state.accidentals.insert((step, oct), alter);
                    alter
                }
                None => state
                    .accidentals
                    .get(&(step, oct))
                    .copied()
                    .unwrap_or(self.key.alter[step]),
            },
        };
        Some(midi_pitch(step, oct, alter))
    }
}

/// Pitch of a note from its own attributes only: `@pnum`, or
/// `@pname`/`@oct` with any accidental on the note. Key signatures and
/// earlier accidentals are not consulted.
pub(crate) fn spelled_pitch(node: Node) -> Option<i32> {
    if let Some(pnum) = parse_pnum(node) {
        return Some(pnum);
    }
    let (step, oct) = spelled_step(node)?;
    let alter = gestural_accid(node).or_else(|| written_accid(node)).unwrap_or(0);
    Some(midi_pitch(step, oct, alter))
}

fn midi_pitch(step: usize, oct: i32, alter: i32) -> i32 {
    12 * (oct + 1) + STEP_PITCH_CLASS[step] + alter
}

fn parse_pnum(node: Node) -> Option<i32> {
    node.attribute("pnum")
        .and_then(|p| p.trim().parse::<f64>().ok())
        .map(|p| p as i32)
}

fn spelled_step(node: Node) -> Option<(usize, i32)> {
    let step = match node.attribute("pname")?.trim() {
        "c" => 0,
        "d" => 1,
        "e" => 2,
        "f" => 3,
        "g" => 4,
        "a" => 5,
        "b" => 6,
        _ => return None,
    };
    let oct = node
        .attribute("oct.ges")
        .or_else(|| node.attribute("oct"))?
        .trim()
        .parse::<i32>()
        .ok()?;
    Some((step, oct))
}

fn gestural_accid(node: Node) -> Option<i32> {
    accid_attribute(node, "accid.ges")
}

fn written_accid(node: Node) -> Option<i32> {
    accid_attribute(node, "accid")
}

/// Accidental on the note itself or on a child `<accid>`.
fn accid_attribute(node: Node, name: &str) -> Option<i32> {
    node.attribute(name)
        .or_else(|| {
            node.children()
                .filter(|c| is(*c, "accid"))
                .find_map(|c| c.attribute(name))
        })
        .and_then(accid_value)
}

fn accid_value(accid: &str) -> Option<i32> {
    let alter = match accid.trim() {
        "n" | "nu" | "nd" => 0,
        "s" | "ns" | "su" | "sd" => 1,
        "f" | "nf" | "fu" | "fd" => -1,
        "ss" | "x" => 2,
        "ff" => -2,
        "xs" | "sx" | "ts" => 3,
        "tf" => -3,
        _ => return None,
    };
    Some(alter)
}

fn parse_dur(dur: &str) -> Option<Whole> {
    match dur.trim() {
        "maxima" => Some(Ratio::from_integer(8)),
        "long" => Some(Ratio::from_integer(4)),
        "breve" => Some(Ratio::from_integer(2)),
        n => match n.parse::<u64>() {
            Ok(n) if n > 0 => Some(Ratio::new(1, n)),
            _ => None,
        },
    }
}

fn parse_count(node: Node, name: &str) -> Option<u64> {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&v| v > 0)
}
