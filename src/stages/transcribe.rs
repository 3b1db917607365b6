//! One transcript per normalized segment.

use crate::defaults;
use crate::error::{PrepError, Result};
use crate::gate;
use crate::layout::PathLayout;
use crate::stages::{Stage, StageReport, audio_files};
use crate::tools::transcriber::Transcriber;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How an empty transcript is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTranscript {
    /// Log a warning and keep the empty file.
    #[default]
    Warn,
    /// Count it as a failed item and write nothing.
    Fail,
}

impl fmt::Display for EmptyTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyTranscript::Warn => f.write_str("warn"),
            EmptyTranscript::Fail => f.write_str("fail"),
        }
    }
}

impl FromStr for EmptyTranscript {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Ok(EmptyTranscript::Warn),
            "fail" | "error" => Ok(EmptyTranscript::Fail),
            other => Err(format!(
                "unknown empty transcript severity '{other}' (expected 'warn' or 'fail')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscribeConfig {
    /// Transcript extension without the dot.
    pub extension: String,
    pub empty_transcript: EmptyTranscript,
    pub force: bool,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            extension: defaults::TRANSCRIPTION_EXTENSION.to_string(),
            empty_transcript: EmptyTranscript::default(),
            force: false,
        }
    }
}

/// Transcribe every audio file of `normalize_loudness/` into `transcriptions/`.
///
/// An existing transcript means "already transcribed". Failures are per file:
/// logged, recorded, and the next file is attempted.
pub fn transcribe(
    layout: &PathLayout,
    config: &TranscribeConfig,
    transcriber: &dyn Transcriber,
) -> Result<StageReport> {
    std::fs::create_dir_all(&layout.transcriptions)?;
    let mut report = StageReport::new(Stage::Transcribe);
    info!(model = transcriber.model_name(), "transcribing");

    for audio in audio_files(&layout.normalize_loudness)? {
        let Some(stem) = audio.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %audio.display(), "skipping file with a non UTF-8 name");
            report.record_failure(
                &audio,
                &PrepError::InvalidSegmentName {
                    name: audio.display().to_string(),
                },
            );
            continue;
        };
        let target = layout.transcript_path(stem, &config.extension);
        match gate::should_process(&target, config.force) {
            Ok(true) => {}
            Ok(false) => {
                report.record(false);
                continue;
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cannot clear previous transcript");
                report.record_failure(&audio, &e);
                continue;
            }
        }

        let text = match transcriber.transcribe(&audio) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %audio.display(), error = %e, "transcription failed");
                report.record_failure(&audio, &e);
                continue;
            }
        };

        if text.trim().is_empty() {
            match config.empty_transcript {
                EmptyTranscript::Warn => {
                    warn!(path = %target.display(), "transcript is empty");
                }
                EmptyTranscript::Fail => {
                    let e = PrepError::EmptyTranscript {
                        path: target.display().to_string(),
                    };
                    warn!(path = %audio.display(), error = %e, "rejecting empty transcript");
                    report.record_failure(&audio, &e);
                    continue;
                }
            }
        }

        if let Err(e) = write_via_partial(&target, &text) {
            warn!(path = %target.display(), error = %e, "cannot write transcript");
            report.record_failure(&audio, &e);
            continue;
        }
        debug!(path = %target.display(), "transcript written");
        report.record(true);
    }

    info!(
        written = report.processed,
        skipped = report.skipped,
        failed = report.failed.len(),
        "transcription finished"
    );
    Ok(report)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write to `<target>.partial`, then rename into place.
///
/// The partial file is removed again when the rename fails.
fn write_via_partial(target: &Path, text: &str) -> Result<()> {
    let partial = partial_path(target);
    std::fs::write(&partial, text)?;
    if let Err(e) = std::fs::rename(&partial, target) {
        std::fs::remove_file(&partial).ok();
        return Err(e.into());
    }
    Ok(())
}
