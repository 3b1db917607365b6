//! In-process Whisper transcription via whisper-rs.
//!
//! # Feature Gate
//!
//! [`WhisperRsTranscriber`] requires the `whisper` feature and cmake:
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! The WAV loading helpers below are always available.

use crate::defaults;
use crate::error::{PrepError, Result};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use crate::tools::transcriber::Transcriber;
#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Directory holding `ggml-<model>.bin` files.
pub fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("tuneprep")
        .join("models")
}

/// Full path of a ggml model file for `model_name`.
pub fn model_path(model_dir: &Path, model_name: &str) -> PathBuf {
    model_dir.join(format!("ggml-{model_name}.bin"))
}

/// Configuration for the in-process transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Language code (e.g., "ja", "en") or "auto"
    pub language: String,
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: model_path(&default_model_dir(), defaults::WHISPER_MODEL),
            language: defaults::LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Read a WAV file as f32 mono at 16 kHz, the format Whisper expects.
pub fn read_wav_for_whisper(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| PrepError::Transcription {
        message: format!("Failed to open WAV {}: {}", path.display(), e),
    })?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| PrepError::Transcription {
        message: format!("Failed to read WAV samples from {}: {}", path.display(), e),
    })?;

    let mono = downmix(&interleaved, spec.channels);
    Ok(resample(&mono, spec.sample_rate, defaults::WHISPER_SAMPLE_RATE))
}

/// Average interleaved channels into one.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = usize::from(channels);
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Whisper-based transcriber running whisper.cpp in process.
///
/// The model is loaded on the first [`Transcriber::transcribe`] call, so
/// building one for a run that never reaches transcription costs nothing.
#[cfg(feature = "whisper")]
pub struct WhisperRsTranscriber {
    context: Mutex<Option<WhisperContext>>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperRsTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRsTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

#[cfg(feature = "whisper")]
impl WhisperRsTranscriber {
    pub fn new(config: WhisperConfig) -> Self {
        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_start_matches("ggml-").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            context: Mutex::new(None),
            config,
            model_name,
        }
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    fn load_context(&self) -> Result<WhisperContext> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !self.config.model_path.exists() {
            return Err(PrepError::TranscriptionModelNotFound {
                path: self.config.model_path.display().to_string(),
            });
        }
        tracing::info!(model = %self.config.model_path.display(), "loading whisper model");

        WhisperContext::new_with_params(
            self.config.model_path.to_str().ok_or_else(|| PrepError::Transcription {
                message: "Invalid UTF-8 in model path".to_string(),
            })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| PrepError::Transcription {
            message: format!("Failed to load Whisper model: {}", e),
        })
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperRsTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        let samples = read_wav_for_whisper(audio)?;

        let mut guard = self.context.lock().map_err(|e| PrepError::Transcription {
            message: format!("Failed to acquire context lock: {}", e),
        })?;
        if guard.is_none() {
            *guard = Some(self.load_context()?);
        }
        let Some(context) = guard.as_ref() else {
            return Err(PrepError::Transcription {
                message: "Whisper context unavailable".to_string(),
            });
        };

        let mut state = context
            .create_state()
            .map_err(|e| PrepError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .map_err(|e| PrepError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut transcription = String::new();
        for segment in state.as_iter() {
            transcription.push_str(&segment.to_string());
        }
        Ok(transcription.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_whisper_config_default() {
        let config = WhisperConfig::default();
        assert!(config.model_path.ends_with("ggml-base.bin"));
        assert_eq!(config.language, "ja");
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_model_path_format() {
        assert_eq!(
            model_path(Path::new("/models"), "small"),
            PathBuf::from("/models/ggml-small.bin")
        );
    }

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..32).map(|i| i as f32).collect();
        let out = resample(&samples, 32000, 16000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
        assert!(resample(&[], 8000, 16000).is_empty());
    }

    #[test]
    fn test_read_wav_for_whisper_converts_to_16k_mono() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8000 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let samples = read_wav_for_whisper(&path).unwrap();
        assert_eq!(samples.len(), 16000);
        assert!(samples.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_read_wav_for_whisper_rejects_non_wav() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        assert!(matches!(
            read_wav_for_whisper(&path),
            Err(PrepError::Transcription { .. })
        ));
    }

    #[cfg(feature = "whisper")]
    #[test]
    fn test_missing_model_is_reported_on_first_use() {
        let tmp = TempDir::new().unwrap();
        let wav = tmp.path().join("a.wav");
        crate::tools::mock::write_test_wav(&wav, 16000, 1600);
        let transcriber = WhisperRsTranscriber::new(WhisperConfig {
            model_path: tmp.path().join("ggml-missing.bin"),
            language: "ja".to_string(),
            threads: None,
        });
        assert_eq!(transcriber.model_name(), "missing");
        assert!(matches!(
            transcriber.transcribe(&wav),
            Err(PrepError::TranscriptionModelNotFound { .. })
        ));
    }
}
