//! Whole-directory loudness normalization, guarded by a completion marker.

use crate::defaults;
use crate::error::Result;
use crate::gate::{self, StageStatusStore};
use crate::layout::PathLayout;
use crate::stages::{Stage, StageReport, audio_files};
use crate::tools::normalizer::LoudnessNormalizer;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeConfig {
    /// Target loudness in dB LUFS.
    pub loudness_target: f64,
    pub force: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            loudness_target: defaults::LOUDNESS_TARGET,
            force: false,
        }
    }
}

/// Normalize `raw/separate/` into `normalize_loudness/` in one tool invocation.
///
/// Skipped entirely while the stage is recorded complete. A forced run drops
/// the marker and the previous output first. The marker is written only after
/// the normalizer succeeded; a normalizer failure is returned to the caller
/// and is fatal for the pipeline.
pub fn normalize(
    layout: &PathLayout,
    config: &NormalizeConfig,
    normalizer: &dyn LoudnessNormalizer,
    store: &mut dyn StageStatusStore,
) -> Result<StageReport> {
    if gate::stage_complete(store, Stage::Normalize, config.force)? {
        info!(
            path = %layout.normalize_loudness.display(),
            "skipped, loudness normalization already complete"
        );
        return Ok(StageReport::new(Stage::Normalize).with_note("already complete"));
    }

    if config.force {
        store.clear(Stage::Normalize)?;
        if layout.normalize_loudness.exists() {
            info!(path = %layout.normalize_loudness.display(), "removing previous normalization output");
            std::fs::remove_dir_all(&layout.normalize_loudness)?;
        }
    }
    std::fs::create_dir_all(&layout.normalize_loudness)?;

    info!(
        input = %layout.separate.display(),
        output = %layout.normalize_loudness.display(),
        target = config.loudness_target,
        "normalizing loudness"
    );
    if let Err(e) = normalizer.normalize(
        &layout.separate,
        &layout.normalize_loudness,
        config.loudness_target,
    ) {
        error!(path = %layout.separate.display(), error = %e, "loudness normalization failed");
        return Err(e);
    }
    store.mark_complete(Stage::Normalize)?;

    let mut report = StageReport::new(Stage::Normalize);
    report.processed = audio_files(&layout.normalize_loudness)?.len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;
    use crate::gate::{InMemoryStatusStore, MarkerFileStore, StageStatus};
    use crate::tools::mock::MockNormalizer;
    use tempfile::TempDir;

    fn layout_with_segments() -> (TempDir, PathLayout) {
        let tmp = TempDir::new().unwrap();
        let layout = PathLayout::new(tmp.path(), "voice").unwrap();
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.separate.join("a_00001_00-00-00~00-00-35.wav"), b"a").unwrap();
        std::fs::write(layout.separate.join("a_00002_00-00-30~00-01-05.wav"), b"b").unwrap();
        (tmp, layout)
    }

    #[test]
    fn runs_once_then_skips() {
        let (_tmp, layout) = layout_with_segments();
        let normalizer = MockNormalizer::new();
        let mut store = MarkerFileStore::new(&layout);

        let first = normalize(&layout, &NormalizeConfig::default(), &normalizer, &mut store).unwrap();
        assert_eq!(first.processed, 2);
        assert!(layout.normalized_marker().exists());
        assert_eq!(
            std::fs::read_to_string(layout.normalized_marker()).unwrap(),
            "normalized"
        );

        let second = normalize(&layout, &NormalizeConfig::default(), &normalizer, &mut store).unwrap();
        assert_eq!(second.note.as_deref(), Some("already complete"));
        assert_eq!(normalizer.call_count(), 1);
    }

    #[test]
    fn force_reinvokes_and_rewrites_marker() {
        let (_tmp, layout) = layout_with_segments();
        std::fs::write(layout.normalized_marker(), "").unwrap();
        std::fs::write(layout.normalize_loudness.join("stale.wav"), b"old").unwrap();
        let normalizer = MockNormalizer::new();
        let mut store = MarkerFileStore::new(&layout);

        let config = NormalizeConfig {
            force: true,
            ..NormalizeConfig::default()
        };
        let report = normalize(&layout, &config, &normalizer, &mut store).unwrap();
        assert_eq!(normalizer.call_count(), 1);
        assert_eq!(report.processed, 2);
        assert!(!layout.normalize_loudness.join("stale.wav").exists());
        assert_eq!(
            std::fs::read_to_string(layout.normalized_marker()).unwrap(),
            "normalized"
        );
    }

    #[test]
    fn failure_leaves_no_marker() {
        let (_tmp, layout) = layout_with_segments();
        let normalizer = MockNormalizer::new().with_failure();
        let mut store = InMemoryStatusStore::new();

        let err = normalize(&layout, &NormalizeConfig::default(), &normalizer, &mut store).unwrap_err();
        assert!(matches!(err, PrepError::ExternalTool { .. }));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(store.load(Stage::Normalize).unwrap(), StageStatus::Pending);
        assert!(!layout.normalized_marker().exists());
    }

    #[test]
    fn in_memory_store_substitutes_marker() {
        let (_tmp, layout) = layout_with_segments();
        let normalizer = MockNormalizer::new();
        let mut store = InMemoryStatusStore::new().with_complete(Stage::Normalize);

        normalize(&layout, &NormalizeConfig::default(), &normalizer, &mut store).unwrap();
        assert_eq!(normalizer.call_count(), 0);
    }

    #[test]
    fn passes_loudness_target() {
        let (_tmp, layout) = layout_with_segments();
        let normalizer = MockNormalizer::new();
        let config = NormalizeConfig {
            loudness_target: -16.0,
            force: false,
        };
        normalize(&layout, &config, &normalizer, &mut InMemoryStatusStore::new()).unwrap();
        let calls = normalizer.calls();
        assert_eq!(calls[0].0, layout.separate);
        assert_eq!(calls[0].1, layout.normalize_loudness);
        assert_eq!(calls[0].2, -16.0);
    }
}
