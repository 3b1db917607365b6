//! Command-line interface for tuneprep
//!
//! Provides argument parsing using clap derive macros, plus the mapping from
//! parsed flags onto [`Config`] and the per-stage configuration structs.

use crate::config::{Config, validate_extension};
use crate::error::Result;
use crate::pipeline::PipelineConfig;
use crate::segmenter::BoundaryPolicy;
use crate::stages::{
    CopyConfig, EmptyTranscript, FinetuneConfig, FinetuneStep, NormalizeConfig, ReformatConfig,
    SegmentConfig, Stage, TranscribeConfig,
};
use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Prepare speech recordings for speech-synthesis fine-tuning
#[derive(Parser, Debug)]
#[command(
    name = "tuneprep",
    version,
    about = "Prepare speech recordings for speech-synthesis fine-tuning"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy, segment, normalize, transcribe and reformat a dataset
    Prepare(PrepareArgs),

    /// Hand a prepared dataset to fish-speech (tokens, protobuf, training)
    Finetune(FinetuneArgs),

    /// Check that the external tools are installed
    Check,

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

/// Parse a duration: bare seconds or any `humantime` format (`90s`, `2m`, `1h30m`).
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Args, Debug, Clone, PartialEq)]
#[command(group(ArgGroup::new("only").multiple(false)))]
pub struct PrepareArgs {
    /// Dataset name; everything lives under <data_root>/<model-name>/
    #[arg(long, value_name = "NAME")]
    pub model_name: String,

    /// Directory with the source mp3/wav recordings (required unless a later stage runs alone)
    #[arg(long, value_name = "DIR")]
    pub copy_source_raw_directory: Option<PathBuf>,

    /// Offset of the first segment in seconds
    #[arg(long, value_name = "SECONDS")]
    pub start: Option<u64>,

    /// Stride between segment starts in seconds
    #[arg(long, visible_alias = "interval", value_name = "SECONDS")]
    pub term: Option<u64>,

    /// Extra seconds each segment overlaps the next
    #[arg(long, value_name = "SECONDS")]
    pub overlay: Option<u64>,

    /// End-of-input detection: measured (probe duration) or tool-signaled (cut until empty)
    #[arg(long, value_name = "POLICY")]
    pub boundary_policy: Option<BoundaryPolicy>,

    /// Give up on a single cut after this long (e.g. 90s, 2m)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub cut_timeout: Option<Duration>,

    /// Overwrite files already copied into raw/
    #[arg(long)]
    pub force_copy: bool,

    /// Re-cut segments that already exist
    #[arg(long)]
    pub force_separate: bool,

    /// Normalize again even if the .normalized marker is present
    #[arg(long)]
    pub force_normalize: bool,

    /// Transcribe again, replacing existing transcripts
    #[arg(long)]
    pub force_transcribe: bool,

    /// Rebuild reformatted units
    #[arg(long)]
    pub force_before_text_reformatting: bool,

    /// Run only the copy stage
    #[arg(long, group = "only")]
    pub copy_only: bool,

    /// Run only the segmentation stage
    #[arg(long, group = "only")]
    pub separate_only: bool,

    /// Run only loudness normalization
    #[arg(long, group = "only")]
    pub normalize_only: bool,

    /// Run only transcription
    #[arg(long, group = "only")]
    pub transcribe_only: bool,

    /// Run only reformatting
    #[arg(long, group = "only")]
    pub before_text_reformatting_only: bool,

    /// Loudness target in dB LUFS (default: -23.0)
    #[arg(long, value_name = "LUFS", allow_negative_numbers = true)]
    pub loudness_target: Option<f64>,

    /// Transcript file extension without the dot (default: lab)
    #[arg(long, value_name = "EXT")]
    pub transcription_extension: Option<String>,

    /// Whisper model (default: base)
    #[arg(long, value_name = "MODEL")]
    pub whisper_model_name: Option<String>,

    /// Transcription language, or "auto" (default: ja)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Empty transcript handling: warn or fail
    #[arg(long, value_name = "SEVERITY")]
    pub empty_transcript: Option<EmptyTranscript>,

    /// Continue into fine-tuning once preparation is done
    #[arg(long)]
    pub finetune: bool,

    /// Do not ask before fine-tuning
    #[arg(short, long)]
    pub yes: bool,
}

impl PrepareArgs {
    /// The stage selected by a `--*-only` flag.
    pub fn only_stage(&self) -> Option<Stage> {
        [
            (self.copy_only, Stage::Copy),
            (self.separate_only, Stage::Segment),
            (self.normalize_only, Stage::Normalize),
            (self.transcribe_only, Stage::Transcribe),
            (self.before_text_reformatting_only, Stage::Reformat),
        ]
        .into_iter()
        .find_map(|(set, stage)| set.then_some(stage))
    }

    /// Write every flag that was given into `config`, so flags win over
    /// the environment and the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(start) = self.start {
            config.segment.start = start;
        }
        if let Some(term) = self.term {
            config.segment.interval = term;
        }
        if let Some(overlay) = self.overlay {
            config.segment.overlay = overlay;
        }
        if let Some(policy) = self.boundary_policy {
            config.segment.boundary_policy = policy;
        }
        if let Some(timeout) = self.cut_timeout {
            config.segment.cut_timeout = humantime::format_duration(timeout).to_string();
        }
        if let Some(target) = self.loudness_target {
            config.normalize.loudness_target = target;
        }
        if let Some(extension) = &self.transcription_extension {
            config.transcribe.extension = extension.clone();
        }
        if let Some(model) = &self.whisper_model_name {
            config.transcribe.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.transcribe.language = language.clone();
        }
        if let Some(severity) = self.empty_transcript {
            config.transcribe.empty_transcript = severity;
        }
    }

    /// Per-stage configuration from the effective `config` and the stage flags.
    pub fn pipeline_config(&self, config: &Config) -> Result<PipelineConfig> {
        let extension = &config.transcribe.extension;
        validate_extension(extension)?;

        let segment = SegmentConfig::new(
            config.segment.start,
            config.segment.interval,
            config.segment.overlay,
        )?
        .with_boundary_policy(config.segment.boundary_policy)
        .with_force(self.force_separate);

        let finetune = self.finetune.then(|| FinetuneConfig {
            text_extension: extension.clone(),
            ..FinetuneConfig::new(&self.model_name)
        });

        Ok(PipelineConfig {
            copy: self
                .copy_source_raw_directory
                .as_ref()
                .map(|dir| CopyConfig::new(dir).with_force(self.force_copy)),
            segment,
            normalize: NormalizeConfig {
                loudness_target: config.normalize.loudness_target,
                force: self.force_normalize,
            },
            transcribe: TranscribeConfig {
                extension: extension.clone(),
                empty_transcript: config.transcribe.empty_transcript,
                force: self.force_transcribe,
            },
            reformat: ReformatConfig {
                transcript_extension: extension.clone(),
                force: self.force_before_text_reformatting,
            },
            finetune,
            only: self.only_stage(),
        })
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[command(group(ArgGroup::new("only").multiple(false)))]
pub struct FinetuneArgs {
    /// Dataset name, also the training project name
    #[arg(long, value_name = "NAME")]
    pub model_name: String,

    /// Only extract semantic tokens
    #[arg(long, group = "only")]
    pub create_semantic_token_only: bool,

    /// Only build the protobuf dataset
    #[arg(long, group = "only")]
    pub create_protobuf_only: bool,

    /// Only run training
    #[arg(long, group = "only")]
    pub training_only: bool,

    /// Delete existing .npy token files first
    #[arg(long)]
    pub force_create_semantic_token: bool,

    /// Delete existing .protos files first
    #[arg(long)]
    pub force_create_protobuf: bool,

    /// Input directory instead of <data_root>/<model-name>/before_text_reformatting
    #[arg(long, value_name = "DIR")]
    pub override_path: Option<PathBuf>,
}

impl FinetuneArgs {
    pub fn only_step(&self) -> Option<FinetuneStep> {
        [
            (self.create_semantic_token_only, FinetuneStep::SemanticTokens),
            (self.create_protobuf_only, FinetuneStep::Protobuf),
            (self.training_only, FinetuneStep::Training),
        ]
        .into_iter()
        .find_map(|(set, step)| set.then_some(step))
    }

    pub fn finetune_config(&self, config: &Config) -> FinetuneConfig {
        FinetuneConfig {
            override_path: self.override_path.clone(),
            text_extension: config.transcribe.extension.clone(),
            only: self.only_step(),
            force_semantic_tokens: self.force_create_semantic_token,
            force_protobuf: self.force_create_protobuf,
            ..FinetuneConfig::new(&self.model_name)
        }
    }
}
