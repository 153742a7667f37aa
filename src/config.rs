use std::path::PathBuf;

use crate::align::DuplicateColumns;
use crate::utils::Metric;

/// Parameters of one alignment run.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Tick resolution handed to the timing expander, per quarter note.
    pub ppq: u32,
    /// FFT size of the audio chromagram.
    pub n_fft: usize,
    /// Tuning deviation from A440 in fractions of a chroma bin; `None`
    /// estimates it from the recording.
    pub tuning: Option<f32>,
    pub metric: Metric,
    pub duplicates: DuplicateColumns,
    /// Resample the recording to this rate; `None` keeps the native rate.
    pub sample_rate: Option<u32>,
    /// Silence threshold below peak for trimming, in dB.
    pub top_db: f32,
    /// Where the intermediate timestamp map is written and re-read.
    pub timestamps_path: Option<PathBuf>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            ppq: 720,
            n_fft: 2048,
            tuning: None,
            metric: Metric::default(),
            duplicates: DuplicateColumns::default(),
            sample_rate: Some(22050),
            top_db: 60.0,
            timestamps_path: None,
        }
    }
}

impl AlignConfig {
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.ppq == 0 {
            return Err(crate::Error::InvalidParameter {
                name: "ppq",
                value: "0".into(),
                reason: "must be > 0".into(),
            });
        }
        if self.n_fft == 0 {
            return Err(crate::Error::InvalidParameter {
                name: "n_fft",
                value: "0".into(),
                reason: "must be > 0".into(),
            });
        }
        if self.sample_rate == Some(0) {
            return Err(crate::Error::InvalidParameter {
                name: "sample_rate",
                value: "0".into(),
                reason: "must be > 0".into(),
            });
        }
        if let Some(tuning) = self.tuning
            && !(tuning.is_finite() && (-0.5..=0.5).contains(&tuning))
        {
            return Err(crate::Error::InvalidParameter {
                name: "tuning",
                value: tuning.to_string(),
                reason: "must lie within half a bin of A440".into(),
            });
        }
        if !(self.top_db.is_finite() && self.top_db > 0.0) {
            return Err(crate::Error::InvalidParameter {
                name: "top_db",
                value: self.top_db.to_string(),
                reason: "must be a positive number of decibels".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AlignConfig::default();
        assert_eq!(config.ppq, 720);
        assert_eq!(config.duplicates, DuplicateColumns::Last);
        assert!(config.tuning.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let config = AlignConfig {
            ppq: 0,
            ..AlignConfig::default()
        };
        assert!(config.validate().is_err());
        let config = AlignConfig {
            top_db: f32::NAN,
            ..AlignConfig::default()
        };
        assert!(config.validate().is_err());
        let config = AlignConfig {
            tuning: Some(0.75),
            ..AlignConfig::default()
        };
        assert!(config.validate().is_err());
        let config = AlignConfig {
            tuning: Some(-0.2),
            ..AlignConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
