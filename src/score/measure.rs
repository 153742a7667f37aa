//! Per-measure timestamps.
//!
//! Every timed element is looked up in the score to find the measure that
//! encloses it, then the note-level times are reduced to the earliest time
//! per measure.

use log::{debug, warn};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::mei::{TimedTag, element_ids, is, xml_id};
use crate::Result;
use crate::align::TimestampMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureEntry {
    pub measure_number: i64,
    pub measure_id: String,
    pub timestamp_sec: f64,
}

/// Why a timestamped element produced no measure entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureWarning {
    /// The identifier does not name a note or rest of the score.
    UnknownElement { identifier: String },
    /// The element is not inside any measure.
    NoMeasure { identifier: String },
    /// The enclosing measure has no `@n`.
    MissingNumber { identifier: String },
    /// The enclosing measure's `@n` does not start with a number.
    InvalidNumber { identifier: String, value: String },
    /// The enclosing measure has no `@xml:id`.
    MissingId { identifier: String },
}

impl fmt::Display for MeasureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureWarning::UnknownElement { identifier } => {
                write!(f, "`{identifier}` is not a note or rest of the score")
            }
            MeasureWarning::NoMeasure { identifier } => {
                write!(f, "`{identifier}` is not inside a measure")
            }
            MeasureWarning::MissingNumber { identifier } => {
                write!(f, "measure of `{identifier}` has no @n")
            }
            MeasureWarning::InvalidNumber { identifier, value } => {
                write!(f, "measure of `{identifier}` has non-numeric @n `{value}`")
            }
            MeasureWarning::MissingId { identifier } => {
                write!(f, "measure of `{identifier}` has no @xml:id")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MeasureRef {
    number: i64,
    id: String,
}

/// Enclosing measure of every note and rest, keyed by element identifier.
///
/// Elements without `@xml:id` are keyed by the same generated identifiers
/// the timing expanders assign.
#[derive(Debug, Clone, Default)]
pub struct MeasureIndex {
    measures: HashMap<String, std::result::Result<MeasureRef, MeasureWarning>>,
}

impl MeasureIndex {
    pub fn from_mei(mei: &str) -> Result<Self> {
        let doc = Document::parse(mei)?;
        Ok(Self::from_document(&doc))
    }

    pub fn from_document(doc: &Document) -> Self {
        let ids = element_ids(doc);
        let measures = doc
            .descendants()
            .filter(|n| TimedTag::of(*n).is_some())
            .filter_map(|node| {
                let identifier = ids.get(&node.id())?.clone();
                let measure = enclosing_measure(node, &identifier);
                Some((identifier, measure))
            })
            .collect::<HashMap<_, _>>();
        debug!("indexed {} timed elements by measure", measures.len());
        Self { measures }
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Measure entry for `identifier` sounding at `timestamp_sec`.
    pub fn locate(
        &self,
        identifier: &str,
        timestamp_sec: f64,
    ) -> std::result::Result<MeasureEntry, MeasureWarning> {
        match self.measures.get(identifier) {
            Some(Ok(measure)) => Ok(MeasureEntry {
                measure_number: measure.number,
                measure_id: measure.id.clone(),
                timestamp_sec,
            }),
            Some(Err(warning)) => Err(warning.clone()),
            None => Err(MeasureWarning::UnknownElement {
                identifier: identifier.to_string(),
            }),
        }
    }
}

fn enclosing_measure(node: Node, identifier: &str) -> std::result::Result<MeasureRef, MeasureWarning> {
    let identifier = identifier.to_string();
    let Some(measure) = node.ancestors().skip(1).find(|n| is(*n, "measure")) else {
        return Err(MeasureWarning::NoMeasure { identifier });
    };
    let Some(n) = measure.attribute("n") else {
        return Err(MeasureWarning::MissingNumber { identifier });
    };
    let Some(number) = measure_number(n) else {
        return Err(MeasureWarning::InvalidNumber {
            identifier,
            value: n.to_string(),
        });
    };
    let Some(id) = xml_id(measure) else {
        return Err(MeasureWarning::MissingId { identifier });
    };
    Ok(MeasureRef {
        number,
        id: id.to_string(),
    })
}

/// Leading integer of a measure label: "12" and "12a" are both 12.
fn measure_number(label: &str) -> Option<i64> {
    let label = label.trim();
    let digits = label
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(label.len(), |(i, _)| i);
    label[..digits].parse().ok()
}

/// Measure entries found for a timestamp map.
#[derive(Debug, Clone, Default)]
pub struct MeasureLookup {
    pub entries: Vec<MeasureEntry>,
    pub skipped: Vec<MeasureWarning>,
}

/// Look up the measure of every timestamped element. Elements that cannot
/// be placed are logged and reported in `skipped`; entries are not reduced.
pub fn measure_timestamps(timestamps: &TimestampMap, index: &MeasureIndex) -> MeasureLookup {
    let mut lookup = MeasureLookup::default();
    for (identifier, &seconds) in timestamps.iter() {
        match index.locate(identifier, seconds) {
            Ok(entry) => lookup.entries.push(entry),
            Err(warning) => {
                warn!("skipping {warning}");
                lookup.skipped.push(warning);
            }
        }
    }
    lookup
}

/// Keep the earliest entry of every measure and order the result by
/// measure number, then time.
///
/// Of entries with equal timestamps in one measure, the first one seen is
/// kept. Applying the filter to its own output changes nothing.
pub fn filter_measures_by_earliest(
    entries: impl IntoIterator<Item = MeasureEntry>,
) -> Vec<MeasureEntry> {
    let mut earliest: HashMap<String, MeasureEntry> = HashMap::new();
    for entry in entries {
        match earliest.get_mut(&entry.measure_id) {
            Some(kept) if entry.timestamp_sec < kept.timestamp_sec => *kept = entry,
            Some(_) => {}
            None => {
                earliest.insert(entry.measure_id.clone(), entry);
            }
        }
    }

    let mut filtered: Vec<MeasureEntry> = earliest.into_values().collect();
    filtered.sort_by(|a, b| {
        a.measure_number
            .cmp(&b.measure_number)
            .then(a.timestamp_sec.total_cmp(&b.timestamp_sec))
            .then_with(|| a.measure_id.cmp(&b.measure_id))
    });
    filtered
}

/// Measure lookup followed by the earliest-per-measure reduction.
pub fn aggregate_measures(timestamps: &TimestampMap, index: &MeasureIndex) -> MeasureLookup {
    let MeasureLookup { entries, skipped } = measure_timestamps(timestamps, index);
    let entries = filter_measures_by_earliest(entries);
    debug!(
        "{} measure entries, {} elements skipped",
        entries.len(),
        skipped.len()
    );
    MeasureLookup { entries, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: &str = r#"<mei xmlns="http://www.music-encoding.org/ns/mei"><music><body><mdiv><score><section>
        <measure xml:id="m1" n="1"><staff><layer>
          <note xml:id="a" pname="c" oct="4" dur="2"/><note xml:id="b" pname="d" oct="4" dur="2"/>
        </layer></staff></measure>
        <measure xml:id="m2" n="2a"><staff><layer><rest dur="1"/></layer></staff></measure>
        <measure n="3"><staff><layer><note xml:id="c" pname="e" oct="4" dur="1"/></layer></staff></measure>
        <measure xml:id="m4"><staff><layer><note xml:id="d" pname="f" oct="4" dur="1"/></layer></staff></measure>
        <measure xml:id="m5" n="x"><staff><layer><note xml:id="e" pname="g" oct="4" dur="1"/></layer></staff></measure>
      </section><note xml:id="loose" pname="a" oct="4" dur="1"/></score></mdiv></body></music></mei>"#;

    fn entry(number: i64, id: &str, ts: f64) -> MeasureEntry {
        MeasureEntry {
            measure_number: number,
            measure_id: id.into(),
            timestamp_sec: ts,
        }
    }

    #[test]
    fn locates_enclosing_measures() {
        let index = MeasureIndex::from_mei(SCORE).unwrap();
        assert_eq!(index.len(), 7);
        assert_eq!(index.locate("a", 0.5).unwrap(), entry(1, "m1", 0.5));
        // generated identifier of the rest, third timed element
        assert_eq!(index.locate("rest-gen2", 2.0).unwrap(), entry(2, "m2", 2.0));
        assert!(matches!(index.locate("c", 0.0), Err(MeasureWarning::MissingId { .. })));
        assert!(matches!(index.locate("d", 0.0), Err(MeasureWarning::MissingNumber { .. })));
        assert!(matches!(index.locate("e", 0.0), Err(MeasureWarning::InvalidNumber { .. })));
        assert!(matches!(index.locate("loose", 0.0), Err(MeasureWarning::NoMeasure { .. })));
        assert!(matches!(
            index.locate("missing", 0.0),
            Err(MeasureWarning::UnknownElement { .. })
        ));
    }

    #[test]
    fn measure_numbers_use_leading_digits() {
        assert_eq!(measure_number("12"), Some(12));
        assert_eq!(measure_number(" 7b "), Some(7));
        assert_eq!(measure_number("x1"), None);
        assert_eq!(measure_number(""), None);
    }

    #[test]
    fn earliest_entry_per_measure_wins() {
        let filtered = filter_measures_by_earliest(vec![
            entry(2, "m2", 3.0),
            entry(1, "m1", 1.5),
            entry(1, "m1", 0.5),
            entry(2, "m2", 2.5),
        ]);
        assert_eq!(filtered, vec![entry(1, "m1", 0.5), entry(2, "m2", 2.5)]);
    }

    #[test]
    fn equal_numbers_order_by_time() {
        let filtered = filter_measures_by_earliest(vec![
            entry(3, "volta-2", 9.0),
            entry(3, "volta-1", 6.0),
            entry(1, "m1", 0.0),
        ]);
        let ids: Vec<_> = filtered.iter().map(|e| e.measure_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "volta-1", "volta-2"]);
    }

    #[test]
    fn aggregation_skips_unplaced_elements() {
        let index = MeasureIndex::from_mei(SCORE).unwrap();
        let timestamps: TimestampMap = [("a", 0.0), ("b", 1.0), ("rest-gen2", 2.0), ("c", 3.0)]
            .into_iter()
            .map(|(id, ts)| (id.to_string(), ts))
            .collect();
        let lookup = aggregate_measures(&timestamps, &index);
        assert_eq!(lookup.entries, vec![entry(1, "m1", 0.0), entry(2, "m2", 2.0)]);
        assert_eq!(lookup.skipped.len(), 1);
        assert_eq!(lookup.skipped[0].to_string(), "measure of `c` has no @xml:id");
    }
}
