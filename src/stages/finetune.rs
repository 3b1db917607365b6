//! Hand-off to fish-speech: semantic tokens, protobuf dataset, training.
//!
//! Unlike the preparation stages every failure here is fatal: the steps feed
//! each other and an external trainer cannot be resumed half-way.

use crate::defaults;
use crate::error::{PrepError, Result};
use crate::layout::PathLayout;
use crate::stages::{Stage, StageReport};
use crate::tools::trainer::Trainer;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// One step of the hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinetuneStep {
    SemanticTokens,
    Protobuf,
    Training,
}

impl FinetuneStep {
    pub const ALL: [FinetuneStep; 3] = [
        FinetuneStep::SemanticTokens,
        FinetuneStep::Protobuf,
        FinetuneStep::Training,
    ];
}

impl fmt::Display for FinetuneStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinetuneStep::SemanticTokens => f.write_str("semantic tokens"),
            FinetuneStep::Protobuf => f.write_str("protobuf dataset"),
            FinetuneStep::Training => f.write_str("training"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinetuneConfig {
    /// Project name passed to the trainer; the model name.
    pub project: String,
    /// Replaces `before_text_reformatting` as the input tree.
    pub override_path: Option<PathBuf>,
    pub text_extension: String,
    /// Run a single step instead of all three.
    pub only: Option<FinetuneStep>,
    /// Delete every `*.npy` under the input tree before extraction.
    pub force_semantic_tokens: bool,
    /// Delete `*.protos` in the protobuf directory before building.
    pub force_protobuf: bool,
}

impl FinetuneConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            override_path: None,
            text_extension: defaults::TRANSCRIPTION_EXTENSION.to_string(),
            only: None,
            force_semantic_tokens: false,
            force_protobuf: false,
        }
    }

    fn steps(&self) -> Vec<FinetuneStep> {
        match self.only {
            Some(step) => vec![step],
            None => FinetuneStep::ALL.to_vec(),
        }
    }
}

/// Run the selected fine-tuning steps in order.
pub fn run_finetune(
    layout: &PathLayout,
    config: &FinetuneConfig,
    trainer: &dyn Trainer,
) -> Result<StageReport> {
    let input = config
        .override_path
        .clone()
        .unwrap_or_else(|| layout.before_text_reformatting.clone());
    if !input.is_dir() {
        return Err(PrepError::MissingInput {
            path: input.display().to_string(),
            reason: "fine-tuning input directory does not exist".to_string(),
        });
    }

    let mut report = StageReport::new(Stage::Finetune);
    for step in config.steps() {
        info!(step = %step, input = %input.display(), "fine-tuning step");
        if let Err(e) = run_step(step, &input, layout, config, trainer) {
            error!(step = %step, error = %e, "fine-tuning step failed");
            return Err(e);
        }
        report.record(true);
    }
    Ok(report)
}

fn run_step(
    step: FinetuneStep,
    input: &Path,
    layout: &PathLayout,
    config: &FinetuneConfig,
    trainer: &dyn Trainer,
) -> Result<()> {
    match step {
        FinetuneStep::SemanticTokens => {
            if config.force_semantic_tokens {
                let removed = remove_with_extension(input, "npy", true)?;
                info!(removed, path = %input.display(), "removed semantic token files");
            }
            trainer.extract_semantic_tokens(input)
        }
        FinetuneStep::Protobuf => {
            std::fs::create_dir_all(&layout.protobuf)?;
            if config.force_protobuf {
                let removed = remove_with_extension(&layout.protobuf, "protos", false)?;
                info!(removed, path = %layout.protobuf.display(), "removed protobuf files");
            }
            trainer.build_dataset(input, &layout.protobuf, &config.text_extension)
        }
        FinetuneStep::Training => trainer.train(&config.project),
    }
}

/// Delete files ending in `.extension` under `dir`, returning how many went.
fn remove_with_extension(dir: &Path, extension: &str, recursive: bool) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                removed += remove_with_extension(&path, extension, true)?;
            }
        } else if path.extension().is_some_and(|e| e == extension) {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mock::{MockTrainer, TrainerCall};
    use tempfile::TempDir;

    fn layout() -> (TempDir, PathLayout) {
        let tmp = TempDir::new().unwrap();
        let layout = PathLayout::new(tmp.path(), "voice").unwrap();
        layout.ensure_dirs().unwrap();
        (tmp, layout)
    }

    #[test]
    fn runs_all_steps_in_order() {
        let (_tmp, layout) = layout();
        let trainer = MockTrainer::new();
        let report = run_finetune(&layout, &FinetuneConfig::new("voice"), &trainer).unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(
            trainer.calls(),
            vec![
                TrainerCall::ExtractSemanticTokens(layout.before_text_reformatting.clone()),
                TrainerCall::BuildDataset {
                    input: layout.before_text_reformatting.clone(),
                    output: layout.protobuf.clone(),
                    text_extension: "lab".to_string(),
                },
                TrainerCall::Train("voice".to_string()),
            ]
        );
        assert!(layout.protobuf.is_dir());
    }

    #[test]
    fn only_flag_runs_single_step() {
        let (_tmp, layout) = layout();
        let trainer = MockTrainer::new();
        let config = FinetuneConfig {
            only: Some(FinetuneStep::Training),
            ..FinetuneConfig::new("voice")
        };
        run_finetune(&layout, &config, &trainer).unwrap();
        assert_eq!(trainer.calls(), vec![TrainerCall::Train("voice".to_string())]);
    }

    #[test]
    fn force_semantic_tokens_clears_npy_recursively() {
        let (_tmp, layout) = layout();
        let unit = layout.before_text_reformatting.join("00001_00-00-00~00-00-35");
        std::fs::create_dir_all(&unit).unwrap();
        std::fs::write(unit.join("a.npy"), b"tokens").unwrap();
        std::fs::write(unit.join("a.wav"), b"pcm").unwrap();
        std::fs::write(layout.before_text_reformatting.join("top.npy"), b"t").unwrap();

        let config = FinetuneConfig {
            only: Some(FinetuneStep::SemanticTokens),
            force_semantic_tokens: true,
            ..FinetuneConfig::new("voice")
        };
        run_finetune(&layout, &config, &MockTrainer::new()).unwrap();
        assert!(!unit.join("a.npy").exists());
        assert!(!layout.before_text_reformatting.join("top.npy").exists());
        assert!(unit.join("a.wav").exists());
    }

    #[test]
    fn force_protobuf_clears_protos() {
        let (_tmp, layout) = layout();
        std::fs::create_dir_all(&layout.protobuf).unwrap();
        std::fs::write(layout.protobuf.join("00000000.protos"), b"p").unwrap();
        std::fs::write(layout.protobuf.join("keep.txt"), b"k").unwrap();

        let config = FinetuneConfig {
            only: Some(FinetuneStep::Protobuf),
            force_protobuf: true,
            ..FinetuneConfig::new("voice")
        };
        run_finetune(&layout, &config, &MockTrainer::new()).unwrap();
        assert!(!layout.protobuf.join("00000000.protos").exists());
        assert!(layout.protobuf.join("keep.txt").exists());
    }

    #[test]
    fn override_path_replaces_input() {
        let (tmp, layout) = layout();
        let custom = tmp.path().join("custom");
        std::fs::create_dir_all(&custom).unwrap();
        let trainer = MockTrainer::new();
        let config = FinetuneConfig {
            override_path: Some(custom.clone()),
            only: Some(FinetuneStep::SemanticTokens),
            ..FinetuneConfig::new("voice")
        };
        run_finetune(&layout, &config, &trainer).unwrap();
        assert_eq!(trainer.calls(), vec![TrainerCall::ExtractSemanticTokens(custom)]);
    }

    #[test]
    fn missing_input_is_fatal() {
        let (tmp, layout) = layout();
        let config = FinetuneConfig {
            override_path: Some(tmp.path().join("absent")),
            ..FinetuneConfig::new("voice")
        };
        assert!(matches!(
            run_finetune(&layout, &config, &MockTrainer::new()),
            Err(PrepError::MissingInput { .. })
        ));
    }

    #[test]
    fn step_failure_propagates_exit_code() {
        let (_tmp, layout) = layout();
        let trainer = MockTrainer::new().with_training_failure();
        let err = run_finetune(&layout, &FinetuneConfig::new("voice"), &trainer).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(trainer.calls().len(), 3);
    }
}
