//! Pipeline stages.
//!
//! Each stage reads one directory of the [`PathLayout`](crate::layout::PathLayout),
//! writes the next, and takes exactly its own configuration struct. Stages
//! never look ahead; only the [`Pipeline`](crate::pipeline::Pipeline) knows the order.

pub mod copy;
pub mod finetune;
pub mod normalize;
pub mod reformat;
pub mod segment;
pub mod transcribe;

pub use copy::{CopyConfig, copy_sources};
pub use finetune::{FinetuneConfig, FinetuneStep, run_finetune};
pub use normalize::{NormalizeConfig, normalize};
pub use reformat::{ReformatConfig, reformat};
pub use segment::{SegmentConfig, segment};
pub use transcribe::{EmptyTranscript, TranscribeConfig, transcribe};

use crate::defaults;
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A phase of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Copy,
    Segment,
    Normalize,
    Transcribe,
    Reformat,
    Finetune,
}

impl Stage {
    /// The data-preparation stages, without the fine-tune hand-off.
    pub const PREPARATION: [Stage; 5] = [
        Stage::Copy,
        Stage::Segment,
        Stage::Normalize,
        Stage::Transcribe,
        Stage::Reformat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Copy => "copy",
            Stage::Segment => "segment",
            Stage::Normalize => "normalize",
            Stage::Transcribe => "transcribe",
            Stage::Reformat => "reformat",
            Stage::Finetune => "finetune",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(Stage::Copy),
            "segment" | "separate" => Ok(Stage::Segment),
            "normalize" | "normalize-loudness" => Ok(Stage::Normalize),
            "transcribe" => Ok(Stage::Transcribe),
            "reformat" | "before-text-reformatting" => Ok(Stage::Reformat),
            "finetune" => Ok(Stage::Finetune),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    /// Outputs written.
    pub processed: usize,
    /// Outputs left alone because they already existed.
    pub skipped: usize,
    /// Items that failed, with the reason. Non-fatal by construction.
    pub failed: Vec<(PathBuf, String)>,
    /// Outputs left partially built (reformat units missing a file).
    pub incomplete: Vec<PathBuf>,
    /// Set when the stage was not run at all (marker present, confirmation declined).
    pub note: Option<String>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            skipped: 0,
            failed: Vec::new(),
            incomplete: Vec::new(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn record(&mut self, processed: bool) {
        if processed {
            self.processed += 1;
        } else {
            self.skipped += 1;
        }
    }

    pub fn record_failure(&mut self, path: &Path, error: &PrepError) {
        self.failed.push((path.to_path_buf(), error.to_string()));
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.incomplete.is_empty()
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processed, {} skipped",
            self.stage, self.processed, self.skipped
        )?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        if !self.incomplete.is_empty() {
            write!(f, ", {} incomplete", self.incomplete.len())?;
        }
        if let Some(note) = &self.note {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}

/// Regular `mp3`/`wav` files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(defaults::is_audio_extension);
        if is_audio && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name of `path` as UTF-8, or an `InvalidSegmentName` error.
pub(crate) fn utf8_file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PrepError::InvalidSegmentName {
            name: path.display().to_string(),
        })
}
