use crate::defaults;
use crate::error::{PrepError, Result};
use crate::tools::executor::{CommandExecutor, SystemCommandExecutor, path_arg};
use std::path::Path;
use std::sync::Arc;

/// Trait for speech-to-text transcription of one audio file.
///
/// This trait allows swapping implementations (whisper CLI, in-process whisper-rs, mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio` to text.
    fn transcribe(&self, audio: &Path) -> Result<String>;

    /// Get the name of the model in use
    fn model_name(&self) -> &str;
}

impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

impl<T: Transcriber + ?Sized> Transcriber for Box<T> {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Runs the openai-whisper command line tool and reads back its `.txt` output.
#[derive(Debug, Clone)]
pub struct WhisperCliTranscriber<E: CommandExecutor> {
    executor: E,
    program: String,
    model: String,
    language: String,
}

impl<E: CommandExecutor> WhisperCliTranscriber<E> {
    pub fn new(
        executor: E,
        program: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            model: model.into(),
            language: language.into(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn build_args<'a>(&'a self, audio: &'a str, output_dir: &'a str) -> Vec<&'a str> {
        let mut args = vec![
            audio,
            "--model",
            self.model.as_str(),
            "--output_format",
            "txt",
            "--output_dir",
            output_dir,
            "--verbose",
            "False",
        ];
        if self.language != defaults::AUTO_LANGUAGE {
            args.push("--language");
            args.push(self.language.as_str());
        }
        args
    }
}

impl WhisperCliTranscriber<SystemCommandExecutor> {
    pub fn system(
        program: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self::new(SystemCommandExecutor::new(), program, model, language)
    }
}

impl<E: CommandExecutor> Transcriber for WhisperCliTranscriber<E> {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        let scratch = tempfile::Builder::new().prefix("tuneprep-whisper").tempdir()?;
        let output_dir = path_arg(scratch.path())?;
        self.executor
            .execute(&self.program, &self.build_args(path_arg(audio)?, output_dir))?;

        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PrepError::Transcription {
                message: format!("cannot derive output name for {}", audio.display()),
            })?;
        let text_path = scratch.path().join(format!("{stem}.txt"));
        let text = std::fs::read_to_string(&text_path).map_err(|e| PrepError::Transcription {
            message: format!(
                "{} produced no transcript for {}: {}",
                self.program,
                audio.display(),
                e
            ),
        })?;
        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mock::{MockCommandExecutor, MockTranscriber};

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("こんにちは");
        let result = transcriber.transcribe(Path::new("a.wav"));
        assert_eq!(result.unwrap(), "こんにちは");
        assert_eq!(transcriber.model_name(), "test-model");
    }

    #[test]
    fn test_transcriber_through_arc() {
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(MockTranscriber::new("m").with_response("shared"));
        assert_eq!(transcriber.transcribe(Path::new("x.wav")).unwrap(), "shared");
        assert_eq!(transcriber.model_name(), "m");
    }

    #[test]
    fn cli_args_include_language_unless_auto() {
        let ja = WhisperCliTranscriber::new(MockCommandExecutor::new(), "whisper", "base", "ja");
        let args = ja.build_args("a.wav", "/tmp/out");
        assert_eq!(args[0], "a.wav");
        assert!(args.windows(2).any(|w| w == ["--model", "base"]));
        assert!(args.windows(2).any(|w| w == ["--output_dir", "/tmp/out"]));
        assert!(args.windows(2).any(|w| w == ["--language", "ja"]));

        let auto = WhisperCliTranscriber::new(MockCommandExecutor::new(), "whisper", "small", "auto");
        assert!(!auto.build_args("a.wav", "/tmp/out").contains(&"--language"));
    }

    #[test]
    fn cli_without_output_file_is_an_error() {
        // The mock executor succeeds but writes nothing into the scratch directory.
        let transcriber =
            WhisperCliTranscriber::new(MockCommandExecutor::new(), "whisper", "base", "ja");
        let result = transcriber.transcribe(Path::new("seg.wav"));
        assert!(matches!(result, Err(PrepError::Transcription { .. })));
        assert_eq!(transcriber.executor().call_count(), 1);
        assert_eq!(transcriber.model_name(), "base");
    }
}
