//! Chroma features from audio, and the adapter that sizes them against a
//! score chromagram.

use crate::pitch::estimate_tuning;
use crate::spectrum::{StftConfig, power_spectrogram};
use crate::utils::{NormType, normalize_2d};
use log::info;
use ndarray::Array2;

/// Number of pitch classes in a chromagram.
pub const N_CHROMA: usize = 12;

/// Convert frequencies (Hz) to fractional octave numbers.
/// A440 is at octave 4.0.
pub fn hz_to_octs(frequencies: &[f32], tuning: f32, bins_per_octave: usize) -> Vec<f32> {
    let a440 = 440.0 * 2.0_f32.powf(tuning / bins_per_octave as f32);
    let ref_freq = a440 / 16.0;

    frequencies
        .iter()
        .map(|&f| {
            if f > 0.0 {
                (f / ref_freq).log2()
            } else {
                f32::NEG_INFINITY
            }
        })
        .collect()
}

/// Create a chroma filter bank.
///
/// Linear transformation projecting FFT bins onto chroma bins. Each FFT
/// bin spreads a Gaussian bump over the chroma bins nearest its pitch; the
/// whole bank is weighted by a Gaussian over octaves centered on `ctroct`.
///
/// # Arguments
/// * `sr` - Sample rate
/// * `n_fft` - FFT size
/// * `n_chroma` - Number of chroma bins
/// * `tuning` - Tuning deviation from A440 in fractional bins
/// * `ctroct` - Center octave for Gaussian weighting
/// * `octwidth` - Octave width for Gaussian weighting (None for flat)
/// * `base_c` - If true, row 0 is C; otherwise A
pub fn chroma_filterbank(
    sr: u32,
    n_fft: usize,
    n_chroma: usize,
    tuning: f32,
    ctroct: f32,
    octwidth: Option<f32>,
    base_c: bool,
) -> Array2<f32> {
    let n_freq = n_fft / 2 + 1;
    let mut wts = Array2::<f32>::zeros((n_chroma, n_freq));

    if n_fft == 0 || n_chroma == 0 {
        return wts;
    }

    let frequencies: Vec<f32> = (1..n_fft)
        .map(|i| i as f32 * sr as f32 / n_fft as f32)
        .collect();

    let mut frqbins: Vec<f32> = hz_to_octs(&frequencies, tuning, n_chroma)
        .iter()
        .map(|&o| o * n_chroma as f32)
        .collect();

    // DC gets a made-up position 1.5 octaves below the first bin
    let dc_bin = frqbins.first().map_or(0.0, |&b| b - 1.5 * n_chroma as f32);
    frqbins.insert(0, dc_bin);

    let binwidthbins: Vec<f32> = (0..frqbins.len())
        .map(|i| match frqbins.get(i + 1) {
            Some(next) => (next - frqbins[i]).max(1.0),
            None => 1.0,
        })
        .collect();

    let n_chroma_f = n_chroma as f32;
    let n_chroma2 = (n_chroma_f / 2.0).round();

    for chroma in 0..n_chroma {
        for fbin in 0..n_freq {
            let mut d = frqbins[fbin] - chroma as f32;
            // wrap into -n_chroma/2 .. n_chroma/2
            d = ((d + n_chroma2 + 10.0 * n_chroma_f) % n_chroma_f) - n_chroma2;
            wts[(chroma, fbin)] = (-0.5 * (2.0 * d / binwidthbins[fbin]).powi(2)).exp();
        }
    }

    wts = normalize_2d(&wts, NormType::L2, 0);

    if let Some(octw) = octwidth {
        for fbin in 0..n_freq {
            let oct = frqbins[fbin] / n_chroma_f;
            let weight = (-0.5 * ((oct - ctroct) / octw).powi(2)).exp();
            wts.column_mut(fbin).mapv_inplace(|w| w * weight);
        }
    }

    if base_c {
        let shift = 3 * (n_chroma / 12);
        if shift > 0 && shift < n_chroma {
            let mut rolled = Array2::<f32>::zeros((n_chroma, n_freq));
            for chroma in 0..n_chroma {
                let new_chroma = (chroma + n_chroma - shift) % n_chroma;
                rolled.row_mut(new_chroma).assign(&wts.row(chroma));
            }
            wts = rolled;
        }
    }

    wts
}

/// Compute a chromagram from a waveform using STFT.
///
/// Power spectrogram, projected through [`chroma_filterbank`], with each
/// frame scaled so its strongest pitch class is 1.0. A `tuning` of `None`
/// is estimated from the same spectrogram with
/// [`estimate_tuning`](crate::pitch::estimate_tuning).
///
/// # Returns
/// Chromagram with shape (n_chroma, n_frames)
pub fn chroma_stft(
    y: &[f32],
    sr: u32,
    n_fft: usize,
    hop_length: usize,
    n_chroma: usize,
    tuning: Option<f32>,
) -> crate::Result<Array2<f32>> {
    let cfg = StftConfig::with_hop(n_fft, hop_length);
    let power = power_spectrogram(y, &cfg)?;
    if power.is_empty() {
        return Ok(Array2::<f32>::zeros((n_chroma, 0)));
    }

    let tuning = tuning.unwrap_or_else(|| estimate_tuning(&power, sr, n_fft, 0.01, n_chroma));
    let chromafb = chroma_filterbank(sr, n_fft, n_chroma, tuning, 5.0, Some(2.0), true);
    let raw = chromafb.dot(&power);
    Ok(normalize_2d(&raw, NormType::Max, 0))
}

/// Audio chromagram sized against a score chromagram.
#[derive(Debug, Clone)]
pub struct AudioChroma {
    /// Shape (12, n_frames).
    pub matrix: Array2<f32>,
    /// Hop length the frames were computed with.
    pub hop_length: usize,
}

impl AudioChroma {
    pub fn columns(&self) -> usize {
        self.matrix.shape()[1]
    }
}

/// Hop length that yields roughly one audio frame per score column.
pub fn matching_hop_length(n_samples: usize, score_columns: usize) -> crate::Result<usize> {
    let too_short = crate::Error::AudioTooShort {
        samples: n_samples,
        columns: score_columns,
    };
    if n_samples == 0 || score_columns == 0 {
        return Err(too_short);
    }
    let hop = (n_samples as f64 / score_columns as f64).round() as usize;
    if hop == 0 {
        return Err(too_short);
    }
    Ok(hop)
}

/// Chromagram of the performance with a hop chosen so the frame count lands
/// near `score_columns` (centered framing adds one frame, rounding may add
/// or remove another).
pub fn audio_chroma(
    samples: &[f32],
    sr: u32,
    score_columns: usize,
    n_fft: usize,
    tuning: Option<f32>,
) -> crate::Result<AudioChroma> {
    let hop_length = matching_hop_length(samples.len(), score_columns)?;
    let matrix = chroma_stft(samples, sr, n_fft, hop_length, N_CHROMA, tuning)?;
    info!(
        "audio chroma shape: {:?} (hop {} samples)",
        matrix.shape(),
        hop_length
    );
    Ok(AudioChroma { matrix, hop_length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;

    fn peak_class(chroma: &Array2<f32>, frame: usize) -> usize {
        (0..chroma.shape()[0])
            .max_by(|&a, &b| chroma[(a, frame)].total_cmp(&chroma[(b, frame)]))
            .unwrap()
    }

    #[test]
    fn test_hz_to_octs() {
        let octs = hz_to_octs(&[440.0], 0.0, 12);
        assert!((octs[0] - 4.0).abs() < 0.01, "A440 should be at octave 4");

        let octs2 = hz_to_octs(&[27.5, 55.0, 110.0, 220.0], 0.0, 12);
        for i in 1..octs2.len() {
            assert!((octs2[i] - octs2[i - 1] - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_chroma_filterbank_shape() {
        let fb = chroma_filterbank(22050, 2048, 12, 0.0, 5.0, Some(2.0), true);
        assert_eq!(fb.shape(), &[12, 1025]);
        assert!(fb.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_chroma_stft_a440() {
        let signal = io::tone(440.0, 22050, 1.0);
        let chroma = chroma_stft(&signal, 22050, 2048, 512, 12, Some(0.0)).unwrap();
        assert_eq!(chroma.shape()[0], 12);
        let mid = chroma.shape()[1] / 2;
        assert_eq!(peak_class(&chroma, mid), 9, "A440 should peak at A");
        assert!((chroma[(9, mid)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_chroma_stft_middle_c() {
        let signal = io::tone(261.63, 22050, 1.0);
        let chroma = chroma_stft(&signal, 22050, 2048, 512, 12, Some(0.0)).unwrap();
        let mid = chroma.shape()[1] / 2;
        assert_eq!(peak_class(&chroma, mid), 0);
    }

    #[test]
    fn test_chroma_stft_follows_detuned_recording() {
        // A4 played 0.35 of a semitone sharp.
        let signal = io::tone(440.0 * 2f32.powf(0.35 / 12.0), 22050, 1.0);
        let fixed = chroma_stft(&signal, 22050, 2048, 512, 12, Some(0.0)).unwrap();
        let estimated = chroma_stft(&signal, 22050, 2048, 512, 12, None).unwrap();
        let mid = fixed.shape()[1] / 2;

        assert_eq!(peak_class(&fixed, mid), 9);
        assert_eq!(peak_class(&estimated, mid), 9);
        assert!(
            estimated[(10, mid)] < 0.5 * fixed[(10, mid)],
            "A# leakage {} vs {}",
            estimated[(10, mid)],
            fixed[(10, mid)]
        );
    }

    #[test]
    fn test_matching_hop_length() {
        assert_eq!(matching_hop_length(22050, 2).unwrap(), 11025);
        assert_eq!(matching_hop_length(10, 4).unwrap(), 3);
        assert!(matching_hop_length(0, 4).is_err());
        assert!(matching_hop_length(1, 4).is_err());
        assert!(matching_hop_length(100, 0).is_err());
    }

    #[test]
    fn test_audio_chroma_column_count_tracks_score() {
        let signal = io::tone(392.0, 22050, 2.0);
        let chroma = audio_chroma(&signal, 22050, 40, 2048, Some(0.0)).unwrap();
        assert_eq!(chroma.hop_length, 1103);
        assert!((chroma.columns() as i64 - 40).abs() <= 2);
    }
}
