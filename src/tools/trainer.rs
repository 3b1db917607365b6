//! fish-speech fine-tuning entry points.
//!
//! Three opaque steps, each a Python script inside a fish-speech checkout:
//! semantic-token extraction, protobuf dataset building and LoRA training.
//! Only success or failure of each step is observed.

use crate::defaults;
use crate::error::Result;
use crate::tools::executor::{CommandExecutor, SystemCommandExecutor, path_arg};
use std::path::{Path, PathBuf};
use tracing::info;

pub trait Trainer: Send + Sync {
    /// Write `.npy` semantic tokens beside every audio file under `input_dir`.
    fn extract_semantic_tokens(&self, input_dir: &Path) -> Result<()>;

    /// Pack audio tokens and transcripts from `input_dir` into `.protos` files in `output_dir`.
    fn build_dataset(&self, input_dir: &Path, output_dir: &Path, text_extension: &str)
    -> Result<()>;

    /// Run LoRA fine-tuning for `project`.
    fn train(&self, project: &str) -> Result<()>;
}

impl<T: Trainer + ?Sized> Trainer for Box<T> {
    fn extract_semantic_tokens(&self, input_dir: &Path) -> Result<()> {
        (**self).extract_semantic_tokens(input_dir)
    }

    fn build_dataset(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        text_extension: &str,
    ) -> Result<()> {
        (**self).build_dataset(input_dir, output_dir, text_extension)
    }

    fn train(&self, project: &str) -> Result<()> {
        (**self).train(project)
    }
}

/// Script arguments for a fish-speech 1.4 checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct FishSpeechSettings {
    pub python: String,
    pub vq_checkpoint: String,
    pub vq_config: String,
    pub batch_size: u32,
    pub num_workers: u32,
    pub dataset_num_workers: u32,
    pub train_config: String,
    pub lora_config: String,
}

impl Default for FishSpeechSettings {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            vq_checkpoint: defaults::VQ_CHECKPOINT.to_string(),
            vq_config: defaults::VQ_CONFIG.to_string(),
            batch_size: defaults::VQ_BATCH_SIZE,
            num_workers: defaults::VQ_NUM_WORKERS,
            dataset_num_workers: defaults::DATASET_NUM_WORKERS,
            train_config: defaults::TRAIN_CONFIG.to_string(),
            lora_config: defaults::LORA_CONFIG.to_string(),
        }
    }
}

/// Runs the fish-speech scripts. The executor is expected to run inside the
/// checkout; data paths are made absolute so they survive the directory change.
#[derive(Debug, Clone)]
pub struct FishSpeechTrainer<E: CommandExecutor> {
    executor: E,
    settings: FishSpeechSettings,
}

impl<E: CommandExecutor> FishSpeechTrainer<E> {
    pub fn new(executor: E, settings: FishSpeechSettings) -> Self {
        Self { executor, settings }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn settings(&self) -> &FishSpeechSettings {
        &self.settings
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        info!(script = args.first().copied().unwrap_or_default(), "running fish-speech step");
        self.executor.execute(&self.settings.python, args)?;
        Ok(())
    }
}

impl FishSpeechTrainer<SystemCommandExecutor> {
    pub fn system(fish_speech_dir: impl Into<PathBuf>, settings: FishSpeechSettings) -> Self {
        Self::new(SystemCommandExecutor::new().in_dir(fish_speech_dir), settings)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

impl<E: CommandExecutor> Trainer for FishSpeechTrainer<E> {
    fn extract_semantic_tokens(&self, input_dir: &Path) -> Result<()> {
        let input = absolute(input_dir)?;
        let num_workers = self.settings.num_workers.to_string();
        let batch_size = self.settings.batch_size.to_string();
        self.run(&[
            "tools/vqgan/extract_vq.py",
            path_arg(&input)?,
            "--num-workers",
            &num_workers,
            "--batch-size",
            &batch_size,
            "--config-name",
            &self.settings.vq_config,
            "--checkpoint-path",
            &self.settings.vq_checkpoint,
        ])
    }

    fn build_dataset(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        text_extension: &str,
    ) -> Result<()> {
        let input = absolute(input_dir)?;
        let output = absolute(output_dir)?;
        let extension = format!(".{}", text_extension.trim_start_matches('.'));
        let num_workers = self.settings.dataset_num_workers.to_string();
        self.run(&[
            "tools/llama/build_dataset.py",
            "--input",
            path_arg(&input)?,
            "--output",
            path_arg(&output)?,
            "--text-extension",
            &extension,
            "--num-workers",
            &num_workers,
        ])
    }

    fn train(&self, project: &str) -> Result<()> {
        let project = format!("project={project}");
        let lora = format!("+lora@model.model.lora_config={}", self.settings.lora_config);
        self.run(&[
            "fish_speech/train.py",
            "--config-name",
            &self.settings.train_config,
            &project,
            &lora,
        ])
    }
}
