//! tuneprep - speech dataset preparation for TTS fine-tuning
//!
//! Copies source recordings, cuts them into overlapping segments, normalizes
//! loudness, transcribes every segment and pairs audio with transcript for
//! fish-speech fine-tuning.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod segmenter;
pub mod stages;
pub mod tools;

// Composition root - wires real tools to CLI arguments
#[cfg(feature = "cli")]
pub mod app;

// Collaborator traits (one per external tool)
pub use tools::{AudioCutter, CommandExecutor, DurationProbe, LoudnessNormalizer, Trainer, Transcriber};

// Orchestration
pub use pipeline::{Collaborators, Confirmation, Pipeline, PipelineConfig, PipelineReport};
pub use stages::{Stage, StageReport};

// Pure parts
pub use layout::{PathLayout, SegmentName};
pub use segmenter::{BoundaryPolicy, Segment, SegmentPlan};

// Error handling
pub use error::{PrepError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
