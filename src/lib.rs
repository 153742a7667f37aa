//! Score-to-audio alignment for MEI scores.
//!
//! scoresync finds where every note and rest of an MEI score sounds in a
//! recording of that score, then reduces those note-level times to one
//! timestamp per measure. Both sides are turned into 12-bin chromagrams,
//! warped onto each other with DTW, and the warp path translates score
//! columns into seconds of the recording.
//!
//! # Quick Start
//!
//! ```rust
//! use scoresync::config::AlignConfig;
//! use scoresync::io::{self, DecodedAudio};
//! use scoresync::pipeline::align_score;
//! use scoresync::score::{AnnotatedExpander, ExpanderHandle};
//!
//! let mei = r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
//!   <measure xml:id="m1" n="1"><staff><layer>
//!     <note xml:id="c" pnum="60" midi.date="0" midi.dur="480"/>
//!     <note xml:id="g" pnum="67" midi.date="480" midi.dur="480"/>
//!   </layer></staff></measure></mei>"#;
//!
//! let sr = 22050;
//! let mut samples = io::tone(261.63, sr, 1.0);
//! samples.extend(io::tone(392.0, sr, 1.0));
//! let audio = DecodedAudio::from_samples(samples, sr);
//!
//! let expander = ExpanderHandle::start(AnnotatedExpander).unwrap();
//! let report = align_score(mei, &audio, &expander, &AlignConfig::default()).unwrap();
//! expander.stop().unwrap();
//!
//! let ts = report.timestamps();
//! assert!(ts.get("g").unwrap() > ts.get("c").unwrap());
//! assert_eq!(report.measures.len(), 1);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`score`] | Timing expanders, score chromagram, measure lookup |
//! | [`align`] | Warp path, column map, timestamp mapping |
//! | [`pipeline`] | End-to-end runs over strings or files |
//! | [`io`] | Audio decoding, resampling, trimming offsets, WAV output |
//! | [`feature`] | STFT chroma and the score-matched audio chromagram |
//! | [`spectrum`] | STFT and power spectrogram |
//! | [`pitch`] | Tuning estimation from spectral peaks |
//! | [`utils`] | DTW, normalization, validation |
//! | [`effects`] | Silence trimming |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`]. Pipeline stages wrap
//! their failures in [`Error::Stage`], so the message names the stage
//! that failed.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` | Compute STFT frames with rayon |

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, Result, Stage};

pub mod align;
pub mod config;
pub mod effects;
pub mod feature;
pub mod fft;
pub mod io;
pub mod pipeline;
pub mod pitch;
pub mod score;
pub mod spectrum;
pub mod utils;
pub mod window;
