//! Cut every raw recording into overlapping windows under `raw/separate/`.

use crate::error::{PrepError, Result};
use crate::gate;
use crate::layout::PathLayout;
use crate::segmenter::{BoundaryPolicy, SegmentPlan};
use crate::stages::{Stage, StageReport, audio_files};
use crate::tools::cutter::AudioCutter;
use crate::tools::probe::DurationProbe;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentConfig {
    pub plan: SegmentPlan,
    pub boundary_policy: BoundaryPolicy,
    pub force: bool,
}

impl SegmentConfig {
    pub fn new(start_secs: u64, interval_secs: u64, overlay_secs: u64) -> Result<Self> {
        Ok(Self {
            plan: SegmentPlan::new(start_secs, interval_secs, overlay_secs)?,
            boundary_policy: BoundaryPolicy::default(),
            force: false,
        })
    }

    pub fn with_boundary_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.boundary_policy = policy;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Segment every recording in `raw/`.
///
/// Per-file failures (unprobeable source, cutter error, timeout) stop that
/// file's loop, are logged and recorded, and the next source file is tried.
pub fn segment(
    layout: &PathLayout,
    config: &SegmentConfig,
    probe: &dyn DurationProbe,
    cutter: &dyn AudioCutter,
) -> Result<StageReport> {
    std::fs::create_dir_all(&layout.separate)?;
    let mut report = StageReport::new(Stage::Segment);

    for source in audio_files(&layout.raw)? {
        segment_file(&source, layout, config, probe, cutter, &mut report);
    }

    info!(
        written = report.processed,
        skipped = report.skipped,
        failed = report.failed.len(),
        "segmentation finished"
    );
    Ok(report)
}

fn segment_file(
    source: &Path,
    layout: &PathLayout,
    config: &SegmentConfig,
    probe: &dyn DurationProbe,
    cutter: &dyn AudioCutter,
    report: &mut StageReport,
) {
    let (Some(base_name), Some(extension)) = (
        source.file_stem().and_then(|s| s.to_str()),
        source.extension().and_then(|s| s.to_str()),
    ) else {
        warn!(path = %source.display(), "skipping source with a non UTF-8 name");
        report.record_failure(
            source,
            &PrepError::InvalidSegmentName {
                name: source.display().to_string(),
            },
        );
        return;
    };

    let bound = match config.boundary_policy {
        BoundaryPolicy::Measured => match probe.duration_secs(source) {
            Ok(secs) => Some(secs),
            Err(e) => {
                warn!(path = %source.display(), error = %e, "cannot measure duration, skipping file");
                report.record_failure(source, &e);
                return;
            }
        },
        BoundaryPolicy::ToolSignaled => None,
    };
    debug!(path = %source.display(), duration = ?bound, policy = %config.boundary_policy, "segmenting");

    for window in config.plan.segments(bound) {
        let target = layout
            .separate
            .join(window.name(base_name, extension).file_name());
        match gate::should_process(&target, config.force) {
            Ok(true) => {}
            Ok(false) => {
                report.record(false);
                continue;
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cannot clear previous segment");
                report.record_failure(&target, &e);
                continue;
            }
        }

        match cutter.cut(source, window.start_secs, window.duration_secs(), &target) {
            Ok(()) => {
                debug!(path = %target.display(), "segment written");
                report.record(true);
            }
            Err(PrepError::InputExhausted { .. }) => {
                info!(
                    path = %source.display(),
                    segments = window.number - 1,
                    "end of input reached"
                );
                break;
            }
            Err(e) => {
                warn!(
                    path = %source.display(),
                    segment = %target.display(),
                    error = %e,
                    "cut failed, moving on to the next source file"
                );
                report.record_failure(&target, &e);
                break;
            }
        }
    }
}
