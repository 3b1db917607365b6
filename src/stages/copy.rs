//! Copy source recordings into `raw/`.

use crate::error::{PrepError, Result};
use crate::gate;
use crate::layout::PathLayout;
use crate::stages::{Stage, StageReport, audio_files, utf8_file_name};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyConfig {
    pub source_dir: PathBuf,
    pub force: bool,
}

impl CopyConfig {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Copy every `mp3`/`wav` of the source directory into `raw/`.
///
/// Fails with `MissingInput` when the source directory is absent or has no
/// regular file at all; that failure is fatal for the whole run.
pub fn copy_sources(layout: &PathLayout, config: &CopyConfig) -> Result<StageReport> {
    let source = &config.source_dir;
    if !source.is_dir() {
        return Err(PrepError::MissingInput {
            path: source.display().to_string(),
            reason: "source directory does not exist".to_string(),
        });
    }
    let has_files = std::fs::read_dir(source)?
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_type().is_ok_and(|t| t.is_file()));
    if !has_files {
        return Err(PrepError::MissingInput {
            path: source.display().to_string(),
            reason: "source directory is empty".to_string(),
        });
    }

    std::fs::create_dir_all(&layout.raw)?;
    let mut report = StageReport::new(Stage::Copy);
    let files = audio_files(source)?;
    if files.is_empty() {
        info!(path = %source.display(), "no mp3 or wav files in source directory");
    }

    for file in files {
        match copy_one(&file, &layout.raw, config.force) {
            Ok(copied) => report.record(copied),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "cannot copy source file");
                report.record_failure(&file, &e);
            }
        }
    }

    info!(
        copied = report.processed,
        skipped = report.skipped,
        failed = report.failed.len(),
        "copy finished"
    );
    Ok(report)
}

/// Copy `file` into `raw`; `Ok(false)` when the gate skipped it.
fn copy_one(file: &Path, raw: &Path, force: bool) -> Result<bool> {
    let target = raw.join(utf8_file_name(file)?);
    if !gate::should_process(&target, force)? {
        return Ok(false);
    }
    std::fs::copy(file, &target)?;
    debug!(from = %file.display(), to = %target.display(), "copied");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathLayout, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let layout = PathLayout::new(tmp.path().join("data"), "voice").unwrap();
        let source = tmp.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        (tmp, layout, source)
    }

    #[test]
    fn copies_only_audio() {
        let (_tmp, layout, source) = setup();
        std::fs::write(source.join("a.mp3"), b"mp3").unwrap();
        std::fs::write(source.join("b.WAV"), b"wav").unwrap();
        std::fs::write(source.join("readme.txt"), b"txt").unwrap();

        let report = copy_sources(&layout, &CopyConfig::new(&source)).unwrap();
        assert_eq!(report.processed, 2);
        assert!(layout.raw.join("a.mp3").exists());
        assert!(layout.raw.join("b.WAV").exists());
        assert!(!layout.raw.join("readme.txt").exists());
    }

    #[test]
    fn second_run_skips_existing() {
        let (_tmp, layout, source) = setup();
        std::fs::write(source.join("a.mp3"), b"new").unwrap();
        std::fs::create_dir_all(&layout.raw).unwrap();
        std::fs::write(layout.raw.join("a.mp3"), b"old").unwrap();

        let report = copy_sources(&layout, &CopyConfig::new(&source)).unwrap();
        assert_eq!((report.processed, report.skipped), (0, 1));
        assert_eq!(std::fs::read(layout.raw.join("a.mp3")).unwrap(), b"old");

        let forced = copy_sources(&layout, &CopyConfig::new(&source).with_force(true)).unwrap();
        assert_eq!(forced.processed, 1);
        assert_eq!(std::fs::read(layout.raw.join("a.mp3")).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn one_failed_copy_does_not_stop_the_rest() {
        let (tmp, layout, source) = setup();
        std::fs::write(source.join("a.mp3"), b"mp3").unwrap();
        std::fs::write(source.join("b.wav"), b"wav").unwrap();
        // dangling link into a directory that does not exist
        std::fs::create_dir_all(&layout.raw).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone/a.mp3"), layout.raw.join("a.mp3"))
            .unwrap();

        let report = copy_sources(&layout, &CopyConfig::new(&source)).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("a.mp3"));
        assert_eq!(std::fs::read(layout.raw.join("b.wav")).unwrap(), b"wav");
    }

    #[test]
    fn missing_source_is_fatal() {
        let (tmp, layout, _source) = setup();
        let err = copy_sources(&layout, &CopyConfig::new(tmp.path().join("absent"))).unwrap_err();
        assert!(matches!(err, PrepError::MissingInput { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn empty_source_is_fatal() {
        let (_tmp, layout, source) = setup();
        std::fs::create_dir(source.join("subdir")).unwrap();
        let err = copy_sources(&layout, &CopyConfig::new(&source)).unwrap_err();
        assert!(matches!(err, PrepError::MissingInput { reason, .. } if reason.contains("empty")));
    }
}
