use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::path::ColumnMap;
use crate::score::IdentifierIndexMap;
use crate::{Error, Result};

/// Seconds into the recording at which each score element sounds.
///
/// Serializes as a flat JSON object `{identifier: seconds}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMap(BTreeMap<String, f64>);

impl TimestampMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<f64> {
        self.0.get(identifier).copied()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, seconds: f64) -> Option<f64> {
        self.0.insert(identifier.into(), seconds)
    }

    /// Entries ordered by identifier.
    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, f64> {
        self.0.iter()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the map as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        debug!("wrote {} timestamps to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let map: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        debug!("read {} timestamps from {}", map.len(), path.display());
        Ok(map)
    }
}

impl FromIterator<(String, f64)> for TimestampMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TimestampMap {
    type Item = (&'a String, &'a f64);
    type IntoIter = std::collections::btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// What the timestamp mapper needs to know about the decoded recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTiming {
    /// Samples in the (trimmed) buffer the audio chromagram was built from.
    pub sample_count: usize,
    pub sample_rate: u32,
    /// Columns of the audio chromagram.
    pub audio_columns: usize,
    /// Silence removed before the buffer starts.
    pub trim_start_ms: f64,
}

impl AudioTiming {
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }

    pub fn seconds_per_column(&self) -> f64 {
        self.duration_seconds() / self.audio_columns as f64
    }
}

/// Translate score columns into seconds of the recording.
///
/// `time = audio_column * seconds_per_column + trim_start_ms / 1000`.
///
/// # Errors
/// [`Error::UnmappedColumn`] when a score column is missing from
/// `columns`; [`Error::InvalidParameter`] for a zero sample rate or
/// column count.
pub fn map_timestamps(
    index: &IdentifierIndexMap,
    columns: &ColumnMap,
    timing: &AudioTiming,
) -> Result<TimestampMap> {
    if timing.sample_rate == 0 {
        return Err(Error::InvalidParameter {
            name: "sample_rate",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }
    if timing.audio_columns == 0 {
        return Err(Error::InvalidParameter {
            name: "audio_columns",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }

    let step = timing.seconds_per_column();
    let offset = timing.trim_start_ms / 1000.0;
    let timestamps = index
        .iter()
        .map(|(identifier, &score_column)| {
            let audio_column = columns.get(score_column).ok_or_else(|| Error::UnmappedColumn {
                identifier: identifier.clone(),
                column: score_column,
            })?;
            Ok((identifier.clone(), audio_column as f64 * step + offset))
        })
        .collect::<Result<TimestampMap>>()?;

    info!(
        "mapped {} identifiers ({:.4} s per audio column, offset {:.3} s)",
        timestamps.len(),
        step,
        offset
    );
    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::DuplicateColumns;
    use approx::assert_relative_eq;

    fn index(entries: &[(&str, usize)]) -> IdentifierIndexMap {
        entries.iter().map(|&(id, col)| (id.to_string(), col)).collect()
    }

    #[test]
    fn columns_scale_to_seconds() {
        let columns = ColumnMap::from_pairs(&[(0, 0), (1, 1), (1, 2)], DuplicateColumns::Last);
        let timing = AudioTiming {
            sample_count: 44100,
            sample_rate: 22050,
            audio_columns: 4,
            trim_start_ms: 0.0,
        };
        let map = map_timestamps(&index(&[("a", 0), ("b", 1)]), &columns, &timing).unwrap();
        assert_relative_eq!(map.get("a").unwrap(), 0.0);
        assert_relative_eq!(map.get("b").unwrap(), 1.0);
    }

    #[test]
    fn trim_offset_shifts_every_timestamp() {
        let columns = ColumnMap::from_pairs(&[(0, 0), (1, 1)], DuplicateColumns::Last);
        let mut timing = AudioTiming {
            sample_count: 1000,
            sample_rate: 1000,
            audio_columns: 2,
            trim_start_ms: 0.0,
        };
        let ids = index(&[("a", 0), ("b", 1)]);
        let plain = map_timestamps(&ids, &columns, &timing).unwrap();
        timing.trim_start_ms = 500.0;
        let shifted = map_timestamps(&ids, &columns, &timing).unwrap();
        for (id, &t) in &plain {
            assert_relative_eq!(shifted.get(id).unwrap(), t + 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_column_is_an_error() {
        let columns = ColumnMap::from_pairs(&[(0, 0)], DuplicateColumns::Last);
        let timing = AudioTiming {
            sample_count: 10,
            sample_rate: 10,
            audio_columns: 1,
            trim_start_ms: 0.0,
        };
        let err = map_timestamps(&index(&[("late", 3)]), &columns, &timing).unwrap_err();
        assert!(matches!(err, Error::UnmappedColumn { column: 3, .. }));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let map: TimestampMap = [("n1", 0.1 + 0.2), ("n2", 1.0 / 3.0), ("r1", 12345.678901234567)]
            .into_iter()
            .map(|(id, t)| (id.to_string(), t))
            .collect();
        let json = map.to_json_string().unwrap();
        assert_eq!(TimestampMap::from_json_str(&json).unwrap(), map);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        map.save(&path).unwrap();
        assert_eq!(TimestampMap::load(&path).unwrap(), map);
        assert!(matches!(
            TimestampMap::load(dir.path().join("absent.json")),
            Err(Error::InputNotFound { .. })
        ));
    }

    #[test]
    fn json_is_a_flat_object() {
        let mut map = TimestampMap::new();
        map.insert("n1", 0.5);
        let value: serde_json::Value = serde_json::from_str(&map.to_json_string().unwrap()).unwrap();
        assert_eq!(value["n1"], serde_json::json!(0.5));
    }
}
