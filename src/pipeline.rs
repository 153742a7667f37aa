//! End-to-end alignment of a score against a recording.
//!
//! Every stage wraps its error with the [`Stage`] it failed in; the first
//! failure ends the run.

use log::info;
use std::fs;
use std::path::Path;

use crate::align::{AudioTiming, TimestampMap, WarpPath, map_timestamps};
use crate::config::AlignConfig;
use crate::error::Stage;
use crate::feature::chroma::audio_chroma;
use crate::io::{DecodedAudio, decode_for_alignment};
use crate::score::{
    ExpanderHandle, MeasureEntry, MeasureIndex, MeasureWarning, ScoreElement, TimingExpander,
    aggregate_measures, score_chroma,
};
use crate::{Error, Result};

/// Note-level alignment of one score against one recording.
#[derive(Debug, Clone)]
pub struct TimestampAlignment {
    pub score_columns: usize,
    pub audio_columns: usize,
    /// Hop length of the audio chromagram, in samples.
    pub hop_length: usize,
    pub path_length: usize,
    pub path_cost: f32,
    pub timestamps: TimestampMap,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct AlignmentReport {
    pub alignment: TimestampAlignment,
    /// Earliest timestamp of every measure, ordered by measure number.
    pub measures: Vec<MeasureEntry>,
    /// Timestamped elements that could not be placed in a measure.
    pub skipped: Vec<MeasureWarning>,
}

impl AlignmentReport {
    pub fn timestamps(&self) -> &TimestampMap {
        &self.alignment.timestamps
    }
}

fn staged<T>(stage: Stage, result: Result<T>) -> Result<T> {
    result.map_err(|e| e.in_stage(stage))
}

/// Score chromagram, audio chromagram, warp path and timestamp mapping for
/// already expanded score elements.
pub fn align_timestamps(
    elements: &[ScoreElement],
    audio: &DecodedAudio,
    config: &AlignConfig,
) -> Result<TimestampAlignment> {
    let score = staged(Stage::ScoreChroma, score_chroma(elements))?;
    let chroma = staged(
        Stage::AudioChroma,
        audio_chroma(
            &audio.samples,
            audio.sample_rate,
            score.columns(),
            config.n_fft,
            config.tuning,
        ),
    )?;
    let path = staged(
        Stage::Alignment,
        WarpPath::compute(&score.matrix, &chroma.matrix, config.metric),
    )?;

    let columns = path.column_map(config.duplicates);
    let timing = AudioTiming {
        sample_count: audio.samples.len(),
        sample_rate: audio.sample_rate,
        audio_columns: chroma.columns(),
        trim_start_ms: audio.trim_start_ms,
    };
    let timestamps = staged(
        Stage::Timestamps,
        map_timestamps(&score.index, &columns, &timing),
    )?;

    Ok(TimestampAlignment {
        score_columns: score.columns(),
        audio_columns: chroma.columns(),
        hop_length: chroma.hop_length,
        path_length: path.len(),
        path_cost: path.cost(),
        timestamps,
    })
}

/// Align MEI markup against decoded audio and reduce the result to one
/// timestamp per measure.
///
/// When `config.timestamps_path` is set, the note-level map is written
/// there and the measure stage reads it back from disk.
pub fn align_score<E: TimingExpander>(
    mei: &str,
    audio: &DecodedAudio,
    expander: &ExpanderHandle<E>,
    config: &AlignConfig,
) -> Result<AlignmentReport> {
    staged(Stage::LoadScore, config.validate())?;
    let elements = staged(Stage::LoadScore, expander.expand(mei, config.ppq))?;
    info!("score: {} timed elements", elements.len());

    let alignment = align_timestamps(&elements, audio, config)?;

    let timestamps = match &config.timestamps_path {
        Some(path) => staged(Stage::Persist, persist_timestamps(&alignment.timestamps, path))?,
        None => alignment.timestamps.clone(),
    };

    let index = staged(Stage::Measures, MeasureIndex::from_mei(mei))?;
    let lookup = aggregate_measures(&timestamps, &index);
    info!(
        "{} measures timestamped, {} elements skipped",
        lookup.entries.len(),
        lookup.skipped.len()
    );

    Ok(AlignmentReport {
        alignment,
        measures: lookup.entries,
        skipped: lookup.skipped,
    })
}

fn persist_timestamps(timestamps: &TimestampMap, path: &Path) -> Result<TimestampMap> {
    timestamps.save(path)?;
    TimestampMap::load(path)
}

/// Read a score file and an audio file and run [`align_score`].
pub fn run_files<E: TimingExpander>(
    score_path: &Path,
    audio_path: &Path,
    expander: &ExpanderHandle<E>,
    config: &AlignConfig,
) -> Result<AlignmentReport> {
    let mei = staged(Stage::LoadScore, read_score(score_path))?;
    if !audio_path.exists() {
        return Err(Error::InputNotFound {
            path: audio_path.to_path_buf(),
        }
        .in_stage(Stage::LoadAudio));
    }
    let audio = staged(
        Stage::LoadAudio,
        decode_for_alignment(audio_path, config.sample_rate, config.top_db),
    )?;
    align_score(&mei, &audio, expander, config)
}

fn read_score(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}
