use crate::fft::FftPlan;
use crate::window;
use ndarray::Array2;
use num_complex::Complex32;

#[derive(Debug, Clone)]
pub struct StftConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    /// Zero-pad `n_fft / 2` samples on both sides so frame `t` is centered
    /// on sample `t * hop_length`.
    pub center: bool,
    pub window: Vec<f32>,
}

impl Default for StftConfig {
    fn default() -> Self {
        let n_fft = 2048;
        let win_length = 2048;
        Self {
            n_fft,
            hop_length: n_fft / 4,
            win_length,
            center: true,
            window: window::hann(win_length),
        }
    }
}

impl StftConfig {
    /// Hann-windowed configuration with `win_length == n_fft`.
    pub fn with_hop(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            win_length: n_fft,
            center: true,
            window: window::hann(n_fft),
        }
    }

    /// Number of frames produced for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        let padded = if self.center { len + 2 * (self.n_fft / 2) } else { len };
        if padded < self.n_fft || self.hop_length == 0 {
            0
        } else {
            (padded - self.n_fft) / self.hop_length + 1
        }
    }
}

fn pad_window(window: &[f32], n_fft: usize) -> Vec<f32> {
    if window.len() == n_fft {
        return window.to_vec();
    }
    let mut padded = vec![0.0f32; n_fft];
    let len = window.len().min(n_fft);
    let start = (n_fft - len) / 2;
    padded[start..start + len].copy_from_slice(&window[..len]);
    padded
}

fn pad_center(y: &[f32], n_fft: usize, center: bool) -> Vec<f32> {
    if !center {
        return y.to_vec();
    }
    let pad = n_fft / 2;
    let mut out = vec![0.0f32; y.len() + 2 * pad];
    out[pad..pad + y.len()].copy_from_slice(y);
    out
}

#[inline]
fn compute_frame(
    frame: usize,
    padded: &[f32],
    window: &[f32],
    fft: &FftPlan,
    hop_length: usize,
) -> crate::Result<Vec<Complex32>> {
    let start = frame * hop_length;
    let mut buffer: Vec<f32> = window
        .iter()
        .enumerate()
        .map(|(i, w)| padded.get(start + i).copied().unwrap_or(0.0) * w)
        .collect();
    fft.forward(&mut buffer)
}

/// Compute the Short-Time Fourier Transform (STFT).
///
/// # Arguments
/// * `y` - Input audio signal
/// * `config` - STFT configuration (FFT size, hop length, window, etc.)
///
/// # Returns
/// Complex STFT matrix of shape (n_freq, n_frames) where n_freq = n_fft/2 + 1
///
/// # Errors
/// Returns an error if the audio is invalid or if n_fft/hop_length is zero.
pub fn stft(y: &[f32], config: &StftConfig) -> crate::Result<Array2<Complex32>> {
    crate::utils::valid_audio(y)?;
    if config.n_fft == 0 {
        return Err(crate::Error::InvalidParameter {
            name: "n_fft",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }
    if config.hop_length == 0 {
        return Err(crate::Error::InvalidParameter {
            name: "hop_length",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }

    let window = pad_window(&config.window, config.n_fft);
    let padded = pad_center(y, config.n_fft, config.center);
    let n_frames = config.frame_count(y.len());
    let n_freq = config.n_fft / 2 + 1;
    let fft = FftPlan::new(config.n_fft);

    let frame_results: Vec<Vec<Complex32>> = {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            (0..n_frames)
                .into_par_iter()
                .map(|frame| compute_frame(frame, &padded, &window, &fft, config.hop_length))
                .collect::<crate::Result<_>>()?
        }
        #[cfg(not(feature = "parallel"))]
        {
            (0..n_frames)
                .map(|frame| compute_frame(frame, &padded, &window, &fft, config.hop_length))
                .collect::<crate::Result<_>>()?
        }
    };

    let mut stft_matrix = Array2::<Complex32>::zeros((n_freq, n_frames));
    for (frame, result) in frame_results.iter().enumerate() {
        for (f, &val) in result.iter().enumerate() {
            stft_matrix[(f, frame)] = val;
        }
    }

    Ok(stft_matrix)
}

/// Power spectrogram `|STFT|^2`, shape (n_freq, n_frames).
pub fn power_spectrogram(y: &[f32], config: &StftConfig) -> crate::Result<Array2<f32>> {
    Ok(stft(y, config)?.mapv(|c| c.norm_sqr()))
}
