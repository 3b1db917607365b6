//! Dataset directory layout and segment file naming.
//!
//! Every model owns one tree under the data root:
//!
//! ```text
//! <data_root>/<model>/raw/                       source audio (mp3, wav)
//! <data_root>/<model>/raw/separate/              overlapping cuts
//! <data_root>/<model>/normalize_loudness/        loudness-normalized cuts + .normalized
//! <data_root>/<model>/transcriptions/            one <stem>.<ext> per cut
//! <data_root>/<model>/before_text_reformatting/  <segnum>_<time>/ units
//! <data_root>/<model>/finetune/
//! <data_root>/<model>/protobuf/                  built by the fine-tune hand-off
//! ```
//!
//! Segment files are named `<base>_<NNNNN>_<HH-MM-SS>~<HH-MM-SS><.ext>`;
//! [`SegmentName::parse`] recovers every field from such a name.

use crate::defaults;
use crate::error::{PrepError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical stage directories for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub separate: PathBuf,
    pub normalize_loudness: PathBuf,
    pub transcriptions: PathBuf,
    pub before_text_reformatting: PathBuf,
    pub finetune: PathBuf,
    pub protobuf: PathBuf,
}

impl PathLayout {
    /// Compute the layout for `model_name` under `data_root`.
    ///
    /// Pure: nothing is created on disk, see [`PathLayout::ensure_dirs`].
    pub fn new(data_root: impl AsRef<Path>, model_name: &str) -> Result<Self> {
        validate_model_name(model_name)?;
        let root = data_root.as_ref().join(model_name);
        let raw = root.join("raw");
        Ok(Self {
            separate: raw.join("separate"),
            raw,
            normalize_loudness: root.join("normalize_loudness"),
            transcriptions: root.join("transcriptions"),
            before_text_reformatting: root.join("before_text_reformatting"),
            finetune: root.join("finetune"),
            protobuf: root.join("protobuf"),
            root,
        })
    }

    /// Layout rooted at the default `./data`.
    pub fn for_model(model_name: &str) -> Result<Self> {
        Self::new(defaults::DATA_ROOT, model_name)
    }

    /// Directories the preparation stages read from or write to.
    pub fn stage_dirs(&self) -> [&Path; 6] {
        [
            &self.raw,
            &self.separate,
            &self.normalize_loudness,
            &self.transcriptions,
            &self.before_text_reformatting,
            &self.finetune,
        ]
    }

    /// Create every stage directory that is missing. Existing ones are left untouched.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in self.stage_dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Completion marker of the normalization stage.
    pub fn normalized_marker(&self) -> PathBuf {
        self.normalize_loudness.join(defaults::NORMALIZED_MARKER)
    }

    /// Transcript path for an audio file stem.
    pub fn transcript_path(&self, audio_stem: &str, extension: &str) -> PathBuf {
        self.transcriptions.join(format!("{audio_stem}.{extension}"))
    }
}

fn validate_model_name(model_name: &str) -> Result<()> {
    let invalid = model_name.trim().is_empty()
        || model_name == "."
        || model_name == ".."
        || model_name.contains(['/', '\\']);
    if invalid {
        return Err(PrepError::InvalidParameter {
            name: "model-name".to_string(),
            message: format!("'{model_name}' is not a usable directory name"),
        });
    }
    Ok(())
}

/// Format whole seconds as `HH-MM-SS`.
///
/// Hours keep growing past 99 instead of wrapping.
pub fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}-{minutes:02}-{seconds:02}")
}

/// Inverse of [`format_clock`].
pub fn parse_clock(text: &str) -> Option<u64> {
    let mut parts = text.split('-');
    let hours = parse_digits(parts.next()?)?;
    let minutes = parse_digits(parts.next()?)?;
    let seconds = parse_digits(parts.next()?)?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Structured form of a segment file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentName {
    pub base_name: String,
    pub number: u32,
    pub start_secs: u64,
    pub end_secs: u64,
    /// Extension without the leading dot; empty when the file has none.
    pub extension: String,
}

impl SegmentName {
    pub fn new(
        base_name: impl Into<String>,
        number: u32,
        start_secs: u64,
        end_secs: u64,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            base_name: base_name.into(),
            number,
            start_secs,
            end_secs,
            extension: extension.into(),
        }
    }

    /// `HH-MM-SS~HH-MM-SS`
    pub fn time_part(&self) -> String {
        format!(
            "{}~{}",
            format_clock(self.start_secs),
            format_clock(self.end_secs)
        )
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        format!("{}_{:05}_{}", self.base_name, self.number, self.time_part())
    }

    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.stem()
        } else {
            format!("{}.{}", self.stem(), self.extension)
        }
    }

    /// Directory name of the reformatted unit for this segment.
    pub fn unit_dir_name(&self) -> String {
        format!("{:05}_{}", self.number, self.time_part())
    }

    /// Parse a segment file name produced by [`SegmentName::file_name`].
    pub fn parse(file_name: &str) -> Result<Self> {
        Self::try_parse(file_name).ok_or_else(|| PrepError::InvalidSegmentName {
            name: file_name.to_string(),
        })
    }

    fn try_parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = match file_name.rsplit_once('.') {
            // A dot inside the base name with no real extension leaves '~' in the tail.
            Some((stem, ext)) if !ext.contains('~') => (stem, ext),
            _ => (file_name, ""),
        };

        let mut fields = stem.rsplitn(3, '_');
        let time_part = fields.next()?;
        let number = fields.next()?;
        let base_name = fields.next()?;

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: u32 = number.parse().ok()?;

        let (start, end) = time_part.split_once('~')?;
        Some(Self {
            base_name: base_name.to_string(),
            number,
            start_secs: parse_clock(start)?,
            end_secs: parse_clock(end)?,
            extension: extension.to_string(),
        })
    }

    /// Parse the file name component of `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PrepError::InvalidSegmentName {
                name: path.display().to_string(),
            })?;
        Self::parse(name)
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
