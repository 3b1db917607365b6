//! Idempotency checks shared by all stages.
//!
//! Two granularities:
//! - per file: [`should_process`] decides whether one output must be (re)produced.
//!   Used by copy, segmentation, transcription and reformatting.
//! - per stage: a [`StageStatusStore`] remembers that a whole-directory stage
//!   finished. Used by loudness normalization, whose tool handles a directory at once.

use crate::defaults;
use crate::error::{PrepError, Result};
use crate::layout::PathLayout;
use crate::stages::Stage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of the per-file check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Target absent: produce it.
    Create,
    /// Target present and forced: delete it, then produce it.
    Overwrite,
    /// Target present, not forced: leave it alone.
    Skip,
}

impl GateDecision {
    pub fn should_process(self) -> bool {
        !matches!(self, GateDecision::Skip)
    }
}

/// Pure decision for `target`, without touching the filesystem beyond an existence check.
pub fn decide(target: &Path, force: bool) -> GateDecision {
    match (target.exists(), force) {
        (false, _) => GateDecision::Create,
        (true, true) => GateDecision::Overwrite,
        (true, false) => GateDecision::Skip,
    }
}

/// Decide whether `target` must be produced, clearing a forced target first.
///
/// Returns `false` (and logs the skip) when the target exists and `force` is off.
/// When it exists and `force` is on, the old file or directory is removed so the
/// caller never merges into stale output.
pub fn should_process(target: &Path, force: bool) -> Result<bool> {
    match decide(target, force) {
        GateDecision::Create => Ok(true),
        GateDecision::Skip => {
            info!(path = %target.display(), "skipped, already exists");
            Ok(false)
        }
        GateDecision::Overwrite => {
            debug!(path = %target.display(), "removing for forced rerun");
            remove_path(target)?;
            Ok(true)
        }
    }
}

fn remove_path(target: &Path) -> Result<()> {
    if target.is_dir() {
        std::fs::remove_dir_all(target)?;
    } else {
        std::fs::remove_file(target)?;
    }
    Ok(())
}

/// Persisted completion state of a whole-directory stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Complete,
}

/// Narrow interface over stage completion markers.
pub trait StageStatusStore {
    fn load(&self, stage: Stage) -> Result<StageStatus>;

    /// Record completion. Only call after the stage fully succeeded.
    fn mark_complete(&mut self, stage: Stage) -> Result<()>;

    /// Forget completion (forced rerun).
    fn clear(&mut self, stage: Stage) -> Result<()>;
}

/// Whether a whole-directory stage can be skipped.
///
/// True only when the stage is recorded complete and `force` is off.
pub fn stage_complete(store: &dyn StageStatusStore, stage: Stage, force: bool) -> Result<bool> {
    if force {
        return Ok(false);
    }
    Ok(store.load(stage)? == StageStatus::Complete)
}

/// Marker files on disk, e.g. `normalize_loudness/.normalized`.
#[derive(Debug, Clone)]
pub struct MarkerFileStore {
    normalized_marker: PathBuf,
}

impl MarkerFileStore {
    pub fn new(layout: &PathLayout) -> Self {
        Self {
            normalized_marker: layout.normalized_marker(),
        }
    }

    fn marker_path(&self, stage: Stage) -> Result<&Path> {
        match stage {
            Stage::Normalize => Ok(&self.normalized_marker),
            other => Err(PrepError::InvalidParameter {
                name: "stage".to_string(),
                message: format!("{other} has no completion marker"),
            }),
        }
    }
}

impl StageStatusStore for MarkerFileStore {
    fn load(&self, stage: Stage) -> Result<StageStatus> {
        if self.marker_path(stage)?.exists() {
            Ok(StageStatus::Complete)
        } else {
            Ok(StageStatus::Pending)
        }
    }

    fn mark_complete(&mut self, stage: Stage) -> Result<()> {
        let marker = self.marker_path(stage)?;
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(marker, defaults::NORMALIZED_MARKER_CONTENT)?;
        debug!(path = %marker.display(), "stage marker written");
        Ok(())
    }

    fn clear(&mut self, stage: Stage) -> Result<()> {
        let marker = self.marker_path(stage)?;
        match std::fs::remove_file(marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    complete: HashSet<Stage>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_complete(mut self, stage: Stage) -> Self {
        self.complete.insert(stage);
        self
    }
}

impl StageStatusStore for InMemoryStatusStore {
    fn load(&self, stage: Stage) -> Result<StageStatus> {
        if self.complete.contains(&stage) {
            Ok(StageStatus::Complete)
        } else {
            Ok(StageStatus::Pending)
        }
    }

    fn mark_complete(&mut self, stage: Stage) -> Result<()> {
        self.complete.insert(stage);
        Ok(())
    }

    fn clear(&mut self, stage: Stage) -> Result<()> {
        self.complete.remove(&stage);
        Ok(())
    }
}
