use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use scoresync::config::AlignConfig;
use scoresync::pipeline::run_files;
use scoresync::score::{AnnotatedExpander, ExpanderHandle, NativeExpander, TimingExpander};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExpanderKind {
    /// Compute timing from @dur, meter and tuplets
    Native,
    /// Read @midi.date / @midi.dur / @pnum written by an external tool
    Annotated,
}

/// Align an MEI score with a recording and print per-measure timestamps.
#[derive(Parser, Debug)]
#[command(name = "scoresync", version)]
struct Args {
    /// MEI score
    score: PathBuf,

    /// Recording of the score (wav, mp3, flac, ogg, m4a)
    audio: PathBuf,

    /// Write the note-level timestamp map here
    #[arg(long)]
    timestamps: Option<PathBuf>,

    /// Write the measure list here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "native")]
    expander: ExpanderKind,

    /// Local DTW distance: euclidean, manhattan or cosine
    #[arg(long, default_value = "euclidean")]
    metric: String,

    /// Audio column kept for a score column visited twice: first or last
    #[arg(long, default_value = "last")]
    duplicates: String,

    /// Ticks per quarter note for timing expansion
    #[arg(long, default_value_t = 720)]
    ppq: u32,

    /// Resample the recording to this rate (0 keeps the native rate)
    #[arg(long, default_value_t = 22050)]
    sample_rate: u32,

    /// Tuning offset from A440 in fractions of a semitone (estimated when omitted)
    #[arg(long, allow_hyphen_values = true)]
    tuning: Option<f32>,

    /// Silence threshold below peak for trimming, in dB
    #[arg(long, default_value_t = 60.0)]
    top_db: f32,
}

fn run(args: Args) -> scoresync::Result<()> {
    let config = AlignConfig {
        ppq: args.ppq,
        tuning: args.tuning,
        metric: args.metric.parse()?,
        duplicates: args.duplicates.parse()?,
        sample_rate: (args.sample_rate > 0).then_some(args.sample_rate),
        top_db: args.top_db,
        timestamps_path: args.timestamps,
        ..AlignConfig::default()
    };

    let expander: Box<dyn TimingExpander> = match args.expander {
        ExpanderKind::Native => Box::new(NativeExpander),
        ExpanderKind::Annotated => Box::new(AnnotatedExpander),
    };
    let handle = ExpanderHandle::start(expander)?;
    let report = run_files(&args.score, &args.audio, &handle, &config);
    handle.stop()?;
    let report = report?;

    if !report.skipped.is_empty() {
        warn!(
            "{} timestamped elements are missing from the measure list",
            report.skipped.len()
        );
    }
    let json = serde_json::to_string_pretty(&report.measures)?;
    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            info!("wrote {} measures to {}", report.measures.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
