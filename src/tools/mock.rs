//! Test doubles for every external collaborator.
//!
//! Exported so integration tests (and downstream users) can drive the
//! pipeline without ffmpeg, fap, whisper or python installed. Every mock is
//! `Clone` and clones share their call log, so a test can keep a handle after
//! boxing one into the pipeline.

use crate::error::{PrepError, Result};
use crate::tools::cutter::AudioCutter;
use crate::tools::executor::CommandExecutor;
use crate::tools::normalizer::LoudnessNormalizer;
use crate::tools::probe::DurationProbe;
use crate::tools::trainer::Trainer;
use crate::tools::transcriber::Transcriber;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write a silent mono 16-bit WAV with `frames` samples.
pub fn write_test_wav(path: &Path, sample_rate: u32, frames: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Ok(mut writer) = hound::WavWriter::create(path, spec) {
        for _ in 0..frames {
            if writer.write_sample(0i16).is_err() {
                return;
            }
        }
        let _finalized = writer.finalize();
    }
}

/// Mock command executor that records calls and replays queued responses.
#[derive(Debug, Default, Clone)]
pub struct MockCommandExecutor {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful response to the queue.
    pub fn with_response(self, response: &str) -> Self {
        lock(&self.responses).push_back(Ok(response.to_string()));
        self
    }

    /// Add an error response to the queue.
    pub fn with_error(self, error: PrepError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Get a specific call by index.
    pub fn call(&self, index: usize) -> Option<(String, Vec<String>)> {
        lock(&self.calls).get(index).cloned()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
        lock(&self.calls).push((
            program.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));

        // Next configured response, or an empty success
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Duration probe answering from a table keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    default: Option<u64>,
    durations: HashMap<String, u64>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockProbe {
    /// Every file lasts `secs`.
    pub fn fixed(secs: u64) -> Self {
        Self {
            default: Some(secs),
            ..Self::default()
        }
    }

    /// Files not listed with [`MockProbe::with_duration`] fail to probe.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, file_name: &str, secs: u64) -> Self {
        self.durations.insert(file_name.to_string(), secs);
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }
}

impl DurationProbe for MockProbe {
    fn duration_secs(&self, path: &Path) -> Result<u64> {
        lock(&self.calls).push(path.to_path_buf());
        self.durations
            .get(&file_name(path))
            .copied()
            .or(self.default)
            .ok_or_else(|| PrepError::ExternalTool {
                tool: "mock-probe".to_string(),
                status: Some(1),
                message: format!("{}: no duration", path.display()),
            })
    }
}

/// One recorded cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutCall {
    pub input: PathBuf,
    pub start_secs: u64,
    pub duration_secs: u64,
    pub output: PathBuf,
}

/// Cutter that writes a small placeholder file per cut.
///
/// With [`MockCutter::with_available`] it behaves like a real tool on a
/// recording of that length: cuts starting at or past the end report
/// `InputExhausted` and leave nothing behind.
#[derive(Debug, Clone, Default)]
pub struct MockCutter {
    available: HashMap<String, u64>,
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<CutCall>>>,
}

impl MockCutter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source `file_name` holds `secs` seconds of audio.
    pub fn with_available(mut self, file_name: &str, secs: u64) -> Self {
        self.available.insert(file_name.to_string(), secs);
        self
    }

    /// Every cut of source `file_name` fails with a non-zero exit.
    pub fn with_failure_for(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<CutCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl AudioCutter for MockCutter {
    fn cut(&self, input: &Path, start_secs: u64, duration_secs: u64, output: &Path) -> Result<()> {
        lock(&self.calls).push(CutCall {
            input: input.to_path_buf(),
            start_secs,
            duration_secs,
            output: output.to_path_buf(),
        });

        let source = file_name(input);
        if self.failing.contains(&source) {
            return Err(PrepError::ExternalTool {
                tool: "mock-cutter".to_string(),
                status: Some(1),
                message: format!("cannot decode {source}"),
            });
        }
        if let Some(&available) = self.available.get(&source)
            && start_secs >= available
        {
            return Err(PrepError::InputExhausted {
                path: output.display().to_string(),
            });
        }
        std::fs::write(output, format!("{source}@{start_secs}+{duration_secs}"))?;
        Ok(())
    }
}

/// Normalizer that copies every regular file from input to output unchanged.
#[derive(Debug, Clone, Default)]
pub struct MockNormalizer {
    should_fail: bool,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf, f64)>>>,
}

impl MockNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail like a non-zero exit.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, f64)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl LoudnessNormalizer for MockNormalizer {
    fn normalize(&self, input_dir: &Path, output_dir: &Path, loudness_target: f64) -> Result<()> {
        lock(&self.calls).push((
            input_dir.to_path_buf(),
            output_dir.to_path_buf(),
            loudness_target,
        ));
        if self.should_fail {
            return Err(PrepError::ExternalTool {
                tool: "mock-normalizer".to_string(),
                status: Some(3),
                message: "mock normalization failure".to_string(),
            });
        }
        std::fs::create_dir_all(output_dir)?;
        for entry in std::fs::read_dir(input_dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::copy(&path, output_dir.join(file_name(&path)))?;
            }
        }
        Ok(())
    }
}

/// Transcriber returning canned text, optionally per file name.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    should_fail: bool,
    per_file: HashMap<String, std::result::Result<String, String>>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            per_file: HashMap::new(),
            calls: Arc::default(),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_file_response(mut self, file_name: &str, response: &str) -> Self {
        self.per_file
            .insert(file_name.to_string(), Ok(response.to_string()));
        self
    }

    pub fn with_file_failure(mut self, file_name: &str) -> Self {
        self.per_file.insert(
            file_name.to_string(),
            Err(format!("mock transcription failure for {file_name}")),
        );
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        lock(&self.calls).push(audio.to_path_buf());
        match self.per_file.get(&file_name(audio)) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(PrepError::Transcription {
                message: message.clone(),
            }),
            None if self.should_fail => Err(PrepError::Transcription {
                message: "mock transcription failure".to_string(),
            }),
            None => Ok(self.response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// A fine-tuning step as seen by [`MockTrainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerCall {
    ExtractSemanticTokens(PathBuf),
    BuildDataset {
        input: PathBuf,
        output: PathBuf,
        text_extension: String,
    },
    Train(String),
}

/// Trainer that records every step and optionally fails one of them.
#[derive(Debug, Clone, Default)]
pub struct MockTrainer {
    fail_training: bool,
    calls: Arc<Mutex<Vec<TrainerCall>>>,
}

impl MockTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_training_failure(mut self) -> Self {
        self.fail_training = true;
        self
    }

    pub fn calls(&self) -> Vec<TrainerCall> {
        lock(&self.calls).clone()
    }
}

impl Trainer for MockTrainer {
    fn extract_semantic_tokens(&self, input_dir: &Path) -> Result<()> {
        lock(&self.calls).push(TrainerCall::ExtractSemanticTokens(input_dir.to_path_buf()));
        Ok(())
    }

    fn build_dataset(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        text_extension: &str,
    ) -> Result<()> {
        lock(&self.calls).push(TrainerCall::BuildDataset {
            input: input_dir.to_path_buf(),
            output: output_dir.to_path_buf(),
            text_extension: text_extension.to_string(),
        });
        Ok(())
    }

    fn train(&self, project: &str) -> Result<()> {
        lock(&self.calls).push(TrainerCall::Train(project.to_string()));
        if self.fail_training {
            return Err(PrepError::ExternalTool {
                tool: "mock-trainer".to_string(),
                status: Some(4),
                message: "mock training failure".to_string(),
            });
        }
        Ok(())
    }
}
