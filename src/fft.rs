use num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Cached real-to-complex FFT plan.
///
/// Only the non-redundant half of the spectrum (`len / 2 + 1` bins) is
/// produced, which is all a power spectrogram of a real signal needs.
///
/// # Example
/// ```
/// use scoresync::fft::FftPlan;
///
/// let plan = FftPlan::new(512);
/// let mut frame = vec![1.0f32; 512];
/// let spectrum = plan.forward(&mut frame).unwrap();
/// assert_eq!(spectrum.len(), 257);
/// ```
pub struct FftPlan {
    forward: Arc<dyn RealToComplex<f32>>,
    len: usize,
}

impl FftPlan {
    /// Create a new FFT plan for a given size.
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        Self { forward, len }
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forward transform of one real frame. The input is used as scratch.
    pub fn forward(&self, input: &mut [f32]) -> crate::Result<Vec<Complex32>> {
        if input.len() != self.len {
            return Err(crate::Error::InvalidParameter {
                name: "input",
                value: input.len().to_string(),
                reason: format!("frame length must equal FFT size {}", self.len),
            });
        }
        let mut output = self.forward.make_output_vec();
        self.forward
            .process(input, &mut output)
            .map_err(|e| crate::Error::InvalidParameter {
                name: "input",
                value: input.len().to_string(),
                reason: e.to_string(),
            })?;
        Ok(output)
    }
}

#[cfg(feature = "parallel")]
const _: () = {
    fn _assert_send_sync<T: Send + Sync>() {}
    fn _check() {
        _assert_send_sync::<FftPlan>();
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_signal_has_energy_only_in_bin_zero() {
        let plan = FftPlan::new(64);
        let mut frame = vec![1.0f32; 64];
        let spectrum = plan.forward(&mut frame).unwrap();
        assert!((spectrum[0].re - 64.0).abs() < 1e-4);
        assert!(spectrum[1..].iter().all(|c| c.norm() < 1e-4));
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let plan = FftPlan::new(64);
        let mut frame = vec![0.0f32; 32];
        assert!(plan.forward(&mut frame).is_err());
    }
}
