/// Trim leading and trailing silence from a signal.
///
/// A sample is silent when its magnitude is more than `top_db` decibels
/// below the peak magnitude of the whole signal.
///
/// # Returns
/// Tuple of (trimmed samples, (start, end)) where `start..end` is the kept
/// range of the input. An all-silent or empty signal yields an empty buffer
/// and `(0, 0)`.
pub fn trim(y: &[f32], top_db: f32) -> (Vec<f32>, (usize, usize)) {
    let Some(threshold) = silence_threshold(y, top_db) else {
        return (Vec::new(), (0, 0));
    };

    let loud = |v: &f32| v.abs() >= threshold;
    let Some(start) = y.iter().position(loud) else {
        return (Vec::new(), (0, 0));
    };
    let end = y.iter().rposition(loud).map_or(start, |i| i + 1);

    (y[start..end].to_vec(), (start, end))
}

fn silence_threshold(y: &[f32], top_db: f32) -> Option<f32> {
    let max_amp = y.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if max_amp <= 0.0 {
        return None;
    }
    Some(max_amp / 10f32.powf(top_db / 20.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_removes_silence() {
        let mut y = vec![0.0f32; 100];
        y.extend(vec![0.5f32; 50]);
        y.extend(vec![0.0f32; 25]);

        let (trimmed, (start, end)) = trim(&y, 40.0);
        assert_eq!(start, 100);
        assert_eq!(end, 150);
        assert_eq!(trimmed.len(), 50);
    }

    #[test]
    fn trim_keeps_quiet_detail_above_threshold() {
        let y = vec![0.0, 0.001, 1.0, 0.02, 0.0];
        let (_, (start, end)) = trim(&y, 40.0);
        assert_eq!((start, end), (2, 4));
    }

    #[test]
    fn trim_silent_signal() {
        assert_eq!(trim(&[0.0; 16], 60.0), (Vec::new(), (0, 0)));
        assert_eq!(trim(&[], 60.0), (Vec::new(), (0, 0)));
    }
}
