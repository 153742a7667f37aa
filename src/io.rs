//! Audio front-end: decoding, downmixing, resampling and silence trimming.
//!
//! Everything downstream of this module works on a single mono buffer held
//! in [`DecodedAudio`], together with the amount of silence that was cut
//! from either end so timestamps can be mapped back onto the recording.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::effects::trim::trim;

/// Frames fed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

/// Rate and channel count of a decoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("wav: {0}")]
    Hound(#[from] hound::Error),
    #[error("decoder: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("no decodable audio track")]
    NoAudioTrack,
    #[error("audio track does not declare its channels")]
    UnsupportedChannels,
    #[error("resampling: {0}")]
    Resample(String),
}

/// Mono audio ready for alignment.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Trimmed mono samples.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Silence removed before the first sample, in milliseconds.
    pub trim_start_ms: f64,
    /// Silence removed after the last sample, in milliseconds.
    pub trim_end_ms: f64,
}

impl DecodedAudio {
    /// Wrap an already prepared buffer without any trim offsets.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            trim_start_ms: 0.0,
            trim_end_ms: 0.0,
        }
    }

    pub fn with_trim_start_ms(mut self, trim_start_ms: f64) -> Self {
        self.trim_start_ms = trim_start_ms;
        self
    }

    /// Duration of the (trimmed) buffer in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read a WAV file with `hound`. Integer PCM of any width is scaled into
/// `[-1, 1)`.
///
/// # Returns
/// (audio_data, audio_spec) where audio_data has shape (channels, frames)
pub fn load_wav<P: AsRef<Path>>(path: P) -> crate::Result<(Array2<f32>, AudioSpec)> {
    let mut reader = WavReader::open(path).map_err(AudioError::from)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>(),
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
        }
    }
    .map_err(AudioError::from)?;

    Ok((
        deinterleave(&interleaved, spec.channels as usize),
        AudioSpec {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    ))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Load audio from a file.
///
/// WAV files go through `hound`; every other container (MP3, FLAC, OGG,
/// MP4/AAC, ...) is probed and decoded by symphonia.
///
/// # Arguments
/// * `path` - Path to audio file
/// * `sr` - Target sample rate (None to keep original)
/// * `mono` - Average channels into one
pub fn load<P: AsRef<Path>>(
    path: P,
    sr: Option<u32>,
    mono: bool,
) -> crate::Result<(Array2<f32>, AudioSpec)> {
    let path = path.as_ref();
    let (mut data, mut spec) = match extension(path).as_deref() {
        Some("wav" | "wave") => load_wav(path)?,
        _ => decode_symphonia(path)?,
    };
    debug!(
        "decoded {} frames, {} channels at {} Hz",
        data.ncols(),
        spec.channels,
        spec.sample_rate
    );

    if mono && data.nrows() > 1 {
        data = to_mono(&data);
        spec.channels = 1;
    }

    if let Some(target) = sr
        && target != spec.sample_rate
        && spec.sample_rate > 0
    {
        data = resample(&data, spec.sample_rate, target)?;
        spec.sample_rate = target;
    }

    Ok((data, spec))
}

fn decode_symphonia(path: &Path) -> Result<(Array2<f32>, AudioSpec), AudioError> {
    let file = std::fs::File::open(path).map_err(SymphoniaError::IoError)?;
    let mut hint = Hint::new();
    if let Some(ext) = extension(path) {
        hint.with_extension(&ext);
    }

    let stream = MediaSourceStream::new(Box::new(file), Default::default());
    let mut format = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?
        .format;

    let (track_id, params) = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or(AudioError::NoAudioTrack)?;
    let channels = params
        .channels
        .map(|c| c.count() as u16)
        .filter(|&c| c > 0)
        .ok_or(AudioError::UnsupportedChannels)?;
    let sample_rate = params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            // end of stream
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let mut buffer =
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(msg)) => warn!("skipping corrupt packet: {msg}"),
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok((
        deinterleave(&interleaved, channels as usize),
        AudioSpec {
            sample_rate,
            channels,
        },
    ))
}

fn deinterleave(samples: &[f32], channels: usize) -> Array2<f32> {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    Array2::from_shape_fn((channels, frames), |(ch, i)| samples[i * channels + ch])
}

/// Band-limited sample rate conversion with rubato's sinc resampler.
///
/// The filter delay is removed, so output frame `i` lines up with input
/// time `i / dst_sr`.
pub fn resample(data: &Array2<f32>, src_sr: u32, dst_sr: u32) -> Result<Array2<f32>, AudioError> {
    let (channels, frames) = data.dim();
    if src_sr == dst_sr || channels == 0 || frames == 0 {
        return Ok(data.clone());
    }

    let ratio = dst_sr as f64 / src_sr as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, channels)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let input: Vec<Vec<f32>> = data.rows().into_iter().map(|row| row.to_vec()).collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;

    while pos < frames {
        let need = resampler.input_frames_next();
        let end = (pos + need).min(frames);
        let chunk: Vec<&[f32]> = input.iter().map(|ch| &ch[pos..end]).collect();
        let result = if end - pos == need {
            resampler.process(&chunk, None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        };
        append(&mut output, result.map_err(|e| AudioError::Resample(e.to_string()))?);
        pos = end;
    }
    // flush what is still inside the filter
    let tail = resampler
        .process_partial(None::<&[&[f32]]>, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    append(&mut output, tail);

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).round() as usize;
    Ok(Array2::from_shape_fn((channels, expected), |(ch, i)| {
        output[ch].get(delay + i).copied().unwrap_or(0.0)
    }))
}

fn append(output: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
    for (out, resampled) in output.iter_mut().zip(chunk) {
        out.extend(resampled);
    }
}

/// Average all channels into one, shape (1, frames).
pub fn to_mono(data: &Array2<f32>) -> Array2<f32> {
    match data.mean_axis(Axis(0)) {
        Some(mean) if data.nrows() > 1 => mean.insert_axis(Axis(0)),
        _ => data.clone(),
    }
}

/// Decode, downmix, resample and trim a recording for alignment.
///
/// Silence below `top_db` relative to the peak is cut from both ends; the
/// amount cut is reported in milliseconds so timestamps can be shifted
/// back onto the original recording.
pub fn decode_for_alignment<P: AsRef<Path>>(
    path: P,
    sr: Option<u32>,
    top_db: f32,
) -> crate::Result<DecodedAudio> {
    let (data, spec) = load(path, sr, true)?;
    let mono = data.row(0).to_vec();
    if !mono.is_empty() {
        crate::utils::valid_audio(&mono)?;
    }

    // A silent recording trims to nothing; the chroma stage rejects it as
    // too short for the score.
    let total = mono.len();
    let (samples, (start, end)) = trim(&mono, top_db);
    if samples.is_empty() {
        warn!("recording has no samples above -{top_db} dB");
    }

    let ms_per_sample = 1000.0 / spec.sample_rate as f64;
    let decoded = DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        trim_start_ms: start as f64 * ms_per_sample,
        trim_end_ms: (total - end) as f64 * ms_per_sample,
    };
    info!(
        "audio: {:.2}s at {} Hz (trimmed {:.0} ms / {:.0} ms)",
        decoded.duration(),
        decoded.sample_rate,
        decoded.trim_start_ms,
        decoded.trim_end_ms
    );
    Ok(decoded)
}

/// Sine tone at full scale, for fixtures.
pub fn tone(frequency: f32, sr: u32, duration: f32) -> Vec<f32> {
    let step = std::f32::consts::TAU * frequency / sr as f32;
    (0..(duration * sr as f32) as usize)
        .map(|i| (step * i as f32).sin())
        .collect()
}

/// Write (channels, frames) audio as 16-bit PCM.
pub fn save_wav<P: AsRef<Path>>(
    path: P,
    data: &Array2<f32>,
    sample_rate: u32,
) -> crate::Result<()> {
    let spec = WavSpec {
        channels: data.nrows().max(1) as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(AudioError::from)?;
    for frame in data.columns() {
        for &sample in frame {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(pcm).map_err(AudioError::from)?;
        }
    }
    writer.finalize().map_err(AudioError::from)?;
    Ok(())
}
