/// Validate a mono audio buffer.
///
/// # Returns
/// `Ok(())` if the buffer is non-empty and every sample is finite
///
/// # Example
/// ```
/// use scoresync::utils::valid_audio;
///
/// assert!(valid_audio(&[0.0, 0.5, -0.5]).is_ok());
/// assert!(valid_audio(&[]).is_err());
/// assert!(valid_audio(&[f32::NAN]).is_err());
/// ```
pub fn valid_audio(y: &[f32]) -> crate::Result<()> {
    if y.is_empty() {
        return Err(crate::Error::EmptyAudio);
    }

    if !y.iter().all(|&v| v.is_finite()) {
        return Err(crate::Error::NonFiniteAudio);
    }

    Ok(())
}
