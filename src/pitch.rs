//! Tuning estimation for recordings that are not at A440.

use crate::feature::chroma::hz_to_octs;
use log::debug;
use ndarray::Array2;

/// Lowest frequency considered when tracking pitches for tuning, in Hz.
pub const TUNING_FMIN: f32 = 150.0;
/// Highest frequency considered when tracking pitches for tuning, in Hz.
pub const TUNING_FMAX: f32 = 4000.0;

/// Spectral peaks of a power (or magnitude) spectrogram.
///
/// A bin is a peak when it is a local maximum along frequency and exceeds
/// `threshold` times the loudest bin of its frame. The peak position is
/// refined by parabolic interpolation over its two neighbours.
///
/// Returns `(frequency_hz, magnitude)` for every peak, frame by frame.
pub fn piptrack(
    spectrogram: &Array2<f32>,
    sr: u32,
    n_fft: usize,
    fmin: f32,
    fmax: f32,
    threshold: f32,
) -> Vec<(f32, f32)> {
    let n_freq = spectrogram.shape()[0];
    if n_fft == 0 || n_freq < 3 {
        return Vec::new();
    }

    let bin_hz = sr as f32 / n_fft as f32;
    let lo = ((fmin / bin_hz).ceil() as usize).max(1);
    let hi = ((fmax / bin_hz).floor() as usize).min(n_freq - 2);
    if lo > hi {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for frame in spectrogram.columns() {
        let reference = frame.iter().copied().fold(0.0f32, f32::max) * threshold;
        for bin in lo..=hi {
            let (prev, curr, next) = (frame[bin - 1], frame[bin], frame[bin + 1]);
            if curr <= prev || curr < next || curr <= reference {
                continue;
            }
            let avg = 0.5 * (next - prev);
            let curvature = 2.0 * curr - next - prev;
            let shift = if curvature.abs() > f32::EPSILON {
                avg / curvature
            } else {
                0.0
            };
            peaks.push(((bin as f32 + shift) * bin_hz, curr + 0.5 * avg * shift));
        }
    }
    peaks
}

/// Most common deviation of `frequencies` from the A440 grid, in
/// fractions of a bin, in `[-0.5, 0.5)`.
///
/// # Example
/// ```
/// use scoresync::pitch::pitch_tuning;
///
/// let tuning = pitch_tuning(&[440.0, 880.0, 220.0], 0.01, 12);
/// assert!(tuning.abs() < 0.02);
/// ```
pub fn pitch_tuning(frequencies: &[f32], resolution: f32, bins_per_octave: usize) -> f32 {
    let positive: Vec<f32> = frequencies.iter().copied().filter(|&f| f > 0.0).collect();
    if positive.is_empty() || resolution.is_nan() || resolution <= 0.0 {
        return 0.0;
    }

    let n_bins = (1.0 / resolution).ceil() as usize;
    let mut histogram = vec![0usize; n_bins];
    for oct in hz_to_octs(&positive, 0.0, bins_per_octave) {
        let bin = oct * bins_per_octave as f32;
        let mut residual = bin - bin.floor();
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let slot = (((residual + 0.5) / resolution).floor() as usize).min(n_bins - 1);
        histogram[slot] += 1;
    }

    // First slot wins ties.
    let mut peak = 0;
    for (slot, &count) in histogram.iter().enumerate() {
        if count > histogram[peak] {
            peak = slot;
        }
    }
    peak as f32 * resolution - 0.5
}

/// Tuning of a recording from its spectrogram.
///
/// Peaks between [`TUNING_FMIN`] and [`TUNING_FMAX`] whose magnitude reaches
/// the median peak magnitude vote in a [`pitch_tuning`] histogram. A
/// spectrogram without peaks is taken to be in tune.
pub fn estimate_tuning(
    spectrogram: &Array2<f32>,
    sr: u32,
    n_fft: usize,
    resolution: f32,
    bins_per_octave: usize,
) -> f32 {
    let peaks = piptrack(spectrogram, sr, n_fft, TUNING_FMIN, TUNING_FMAX, 0.1);
    if peaks.is_empty() {
        return 0.0;
    }

    let mut magnitudes: Vec<f32> = peaks.iter().map(|&(_, m)| m).collect();
    magnitudes.sort_by(f32::total_cmp);
    let median = magnitudes[magnitudes.len() / 2];

    let frequencies: Vec<f32> = peaks
        .into_iter()
        .filter(|&(_, m)| m >= median)
        .map(|(f, _)| f)
        .collect();
    let tuning = pitch_tuning(&frequencies, resolution, bins_per_octave);
    debug!(
        "estimated tuning {tuning:+.2} bins from {} peaks",
        frequencies.len()
    );
    tuning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;
    use crate::spectrum::{StftConfig, power_spectrogram};

    fn tuning_of(freq: f32) -> f32 {
        let y = io::tone(freq, 22050, 0.5);
        let power = power_spectrogram(&y, &StftConfig::with_hop(2048, 512)).unwrap();
        estimate_tuning(&power, 22050, 2048, 0.01, 12)
    }

    #[test]
    fn in_tune_tone() {
        assert!(tuning_of(440.0).abs() < 0.08);
    }

    #[test]
    fn sharp_and_flat_tones() {
        let sharp = tuning_of(440.0 * 2f32.powf(0.3 / 12.0));
        assert!((sharp - 0.3).abs() < 0.08, "sharp estimate {sharp}");
        let flat = tuning_of(440.0 * 2f32.powf(-0.25 / 12.0));
        assert!((flat + 0.25).abs() < 0.08, "flat estimate {flat}");
    }

    #[test]
    fn silence_is_in_tune() {
        let power = Array2::<f32>::zeros((1025, 4));
        assert_eq!(estimate_tuning(&power, 22050, 2048, 0.01, 12), 0.0);
        assert!(piptrack(&power, 22050, 2048, 150.0, 4000.0, 0.1).is_empty());
    }

    #[test]
    fn histogram_wraps_upper_half() {
        // 0.6 bins above A is 0.4 bins below A#.
        let tuning = pitch_tuning(&[440.0 * 2f32.powf(0.6 / 12.0)], 0.01, 12);
        assert!((tuning + 0.4).abs() < 0.02);
    }
}
