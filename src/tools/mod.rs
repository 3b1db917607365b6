//! Adapters for the external programs the pipeline orchestrates.
//!
//! Each tool sits behind a narrow trait so stages depend only on the
//! contract, never on a particular binary or version.

pub mod cutter;
pub mod executor;
pub mod mock;
pub mod normalizer;
pub mod probe;
pub mod trainer;
pub mod transcriber;
pub mod whisper;

pub use cutter::{AudioCutter, FfmpegCutter};
pub use executor::{CommandExecutor, SystemCommandExecutor};
pub use normalizer::{FapNormalizer, LoudnessNormalizer};
pub use probe::{AudioDurationProbe, DurationProbe, FfprobeDurationProbe, WavDurationProbe};
pub use trainer::{FishSpeechSettings, FishSpeechTrainer, Trainer};
pub use transcriber::{Transcriber, WhisperCliTranscriber};
#[cfg(feature = "whisper")]
pub use whisper::WhisperRsTranscriber;
pub use whisper::WhisperConfig;
