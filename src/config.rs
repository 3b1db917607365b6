use crate::defaults;
use crate::error::{PrepError, Result};
use crate::segmenter::BoundaryPolicy;
use crate::stages::EmptyTranscript;
use crate::tools::trainer::FishSpeechSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding one dataset tree per model.
    pub data_root: PathBuf,
    pub segment: SegmentSection,
    pub normalize: NormalizeSection,
    pub transcribe: TranscribeSection,
    pub tools: ToolsSection,
    pub finetune: FinetuneSection,
}

/// Segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentSection {
    pub start: u64,
    pub interval: u64,
    pub overlay: u64,
    pub boundary_policy: BoundaryPolicy,
    /// Max wait per cut, humantime format ("2m", "90s")
    pub cut_timeout: String,
}

/// Loudness normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizeSection {
    pub loudness_target: f64,
}

/// Which speech-to-text implementation transcribes segments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TranscribeBackend {
    /// openai-whisper command line tool
    #[default]
    WhisperCli,
    /// In-process whisper.cpp (requires the `whisper` feature)
    WhisperRs,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscribeSection {
    pub backend: TranscribeBackend,
    pub model: String,
    pub language: String,
    pub extension: String,
    pub empty_transcript: EmptyTranscript,
    /// Where `ggml-<model>.bin` files live for the whisper-rs backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
}

/// External program names or paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsSection {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub fap: String,
    pub whisper: String,
    pub python: String,
}

/// fish-speech hand-off
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinetuneSection {
    pub fish_speech_dir: PathBuf,
    pub vq_checkpoint: String,
    pub vq_config: String,
    pub batch_size: u32,
    pub num_workers: u32,
    pub dataset_num_workers: u32,
    pub train_config: String,
    pub lora_config: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(defaults::DATA_ROOT),
            segment: SegmentSection::default(),
            normalize: NormalizeSection::default(),
            transcribe: TranscribeSection::default(),
            tools: ToolsSection::default(),
            finetune: FinetuneSection::default(),
        }
    }
}

impl Default for SegmentSection {
    fn default() -> Self {
        Self {
            start: defaults::START_SECS,
            interval: defaults::INTERVAL_SECS,
            overlay: defaults::OVERLAY_SECS,
            boundary_policy: BoundaryPolicy::default(),
            cut_timeout: format!("{}s", defaults::CUT_TIMEOUT_SECS),
        }
    }
}

impl Default for NormalizeSection {
    fn default() -> Self {
        Self {
            loudness_target: defaults::LOUDNESS_TARGET,
        }
    }
}

impl Default for TranscribeSection {
    fn default() -> Self {
        Self {
            backend: TranscribeBackend::default(),
            model: defaults::WHISPER_MODEL.to_string(),
            language: defaults::LANGUAGE.to_string(),
            extension: defaults::TRANSCRIPTION_EXTENSION.to_string(),
            empty_transcript: EmptyTranscript::default(),
            model_dir: None,
        }
    }
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            fap: "fap".to_string(),
            whisper: "whisper".to_string(),
            python: "python".to_string(),
        }
    }
}

impl Default for FinetuneSection {
    fn default() -> Self {
        let settings = FishSpeechSettings::default();
        Self {
            fish_speech_dir: PathBuf::from(defaults::FISH_SPEECH_DIR),
            vq_checkpoint: settings.vq_checkpoint,
            vq_config: settings.vq_config,
            batch_size: settings.batch_size,
            num_workers: settings.num_workers,
            dataset_num_workers: settings.dataset_num_workers,
            train_config: settings.train_config,
            lora_config: settings.lora_config,
        }
    }
}

impl SegmentSection {
    /// Parsed `cut_timeout`.
    pub fn cut_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.cut_timeout).map_err(|e| PrepError::ConfigInvalidValue {
            key: "segment.cut_timeout".to_string(),
            message: format!("'{}': {}", self.cut_timeout, e),
        })
    }
}

impl FinetuneSection {
    /// Script settings for the trainer, run with `python`.
    pub fn settings(&self, python: &str) -> FishSpeechSettings {
        FishSpeechSettings {
            python: python.to_string(),
            vq_checkpoint: self.vq_checkpoint.clone(),
            vq_config: self.vq_config.clone(),
            batch_size: self.batch_size,
            num_workers: self.num_workers,
            dataset_num_workers: self.dataset_num_workers,
            train_config: self.train_config.clone(),
            lora_config: self.lora_config.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrepError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                PrepError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(PrepError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TUNEPREP_DATA_ROOT → data_root
    /// - TUNEPREP_WHISPER_MODEL → transcribe.model
    /// - TUNEPREP_LANGUAGE → transcribe.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("TUNEPREP_DATA_ROOT")
            && !root.is_empty()
        {
            self.data_root = PathBuf::from(root);
        }

        if let Ok(model) = std::env::var("TUNEPREP_WHISPER_MODEL")
            && !model.is_empty()
        {
            self.transcribe.model = model;
        }

        if let Ok(language) = std::env::var("TUNEPREP_LANGUAGE")
            && !language.is_empty()
        {
            self.transcribe.language = language;
        }

        self
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.segment.interval == 0 {
            return Err(PrepError::ConfigInvalidValue {
                key: "segment.interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        self.segment.cut_timeout()?;
        if !self.normalize.loudness_target.is_finite() {
            return Err(PrepError::ConfigInvalidValue {
                key: "normalize.loudness_target".to_string(),
                message: "must be a finite number".to_string(),
            });
        }
        validate_extension(&self.transcribe.extension)?;
        Ok(())
    }

    /// The effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PrepError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/tuneprep/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("tuneprep")
            .join("config.toml")
    }
}

/// Transcript extensions are bare: `lab`, not `.lab`.
pub fn validate_extension(extension: &str) -> Result<()> {
    if extension.is_empty() || extension.contains(['.', '/', '\\']) {
        return Err(PrepError::ConfigInvalidValue {
            key: "transcribe.extension".to_string(),
            message: format!("'{extension}' must be a bare extension such as 'lab'"),
        });
    }
    Ok(())
}
