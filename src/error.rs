use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadScore,
    LoadAudio,
    ScoreChroma,
    AudioChroma,
    Alignment,
    Timestamps,
    Persist,
    Measures,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadScore => "loading score",
            Stage::LoadAudio => "loading audio",
            Stage::ScoreChroma => "calculating score chroma features",
            Stage::AudioChroma => "calculating audio chroma features",
            Stage::Alignment => "calculating warping path",
            Stage::Timestamps => "building timestamp map",
            Stage::Persist => "persisting timestamp map",
            Stage::Measures => "aggregating measure timestamps",
        };
        f.write_str(name)
    }
}

/// Crate-level error type for score/audio alignment.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Score or audio source does not exist.
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// No score element carries a (positive) duration.
    #[error("score contains no notes or rests with a duration")]
    EmptyScore,

    /// Audio buffer cannot be split into one frame per score column.
    #[error("audio too short: {samples} samples for {columns} score columns")]
    AudioTooShort { samples: usize, columns: usize },

    /// Chroma matrices cannot be warped against each other.
    #[error("alignment failed: {0}")]
    AlignmentFailed(String),

    /// A score column has no counterpart in the warp path.
    #[error("score column {column} of `{identifier}` is not covered by the warp path")]
    UnmappedColumn { identifier: String, column: usize },

    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio data is empty")]
    EmptyAudio,

    /// Audio data contains non-finite values (NaN or Inf).
    #[error("audio data contains non-finite values")]
    NonFiniteAudio,

    /// Score timing expansion failed.
    #[error("timing expansion failed: {0}")]
    Expander(String),

    /// Malformed score markup.
    #[error("score markup: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Timestamp file (de)serialization.
    #[error("timestamp file: {0}")]
    Json(#[from] serde_json::Error),

    /// Audio I/O errors.
    #[error(transparent)]
    Audio(#[from] crate::io::AudioError),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error annotated with the stage it was raised in.
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach stage context. Errors that already carry a stage keep it.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage this error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Convenience Result type for scoresync operations.
pub type Result<T> = std::result::Result<T, Error>;
