//! Error types for tuneprep.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Missing required argument: {flag}")]
    MissingArgument { flag: String },

    // Input errors
    #[error("Missing input {path}: {reason}")]
    MissingInput { path: String, reason: String },

    // External tool errors
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed{}: {message}", .status.map(|s| format!(" with exit code {s}")).unwrap_or_default())]
    ExternalTool {
        tool: String,
        status: Option<i32>,
        message: String,
    },

    #[error("{tool} did not finish within {}", humantime::format_duration(*.after))]
    ToolTimeout { tool: String, after: Duration },

    #[error("No audio left to cut in {path}")]
    InputExhausted { path: String },

    // Domain errors
    #[error("Not a segment file name: {name}")]
    InvalidSegmentName { name: String },

    #[error("Unit {unit} already holds {existing}")]
    UnitCollision { unit: String, existing: String },

    #[error("Transcript is empty: {path}")]
    EmptyTranscript { path: String },

    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;

/// Coarse classification used by the orchestrator to pick fatal vs. per-item handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    MissingInput,
    ExternalTool,
    Internal,
}

impl PrepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrepError::ConfigFileNotFound { .. }
            | PrepError::ConfigParse { .. }
            | PrepError::ConfigInvalidValue { .. }
            | PrepError::Config(_)
            | PrepError::InvalidParameter { .. }
            | PrepError::MissingArgument { .. } => ErrorKind::Configuration,
            PrepError::MissingInput { .. }
            | PrepError::InvalidSegmentName { .. }
            | PrepError::UnitCollision { .. } => ErrorKind::MissingInput,
            PrepError::ToolNotFound { .. }
            | PrepError::ExternalTool { .. }
            | PrepError::ToolTimeout { .. }
            | PrepError::InputExhausted { .. }
            | PrepError::TranscriptionModelNotFound { .. }
            | PrepError::Transcription { .. }
            | PrepError::EmptyTranscript { .. } => ErrorKind::ExternalTool,
            PrepError::Io(_) | PrepError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Process exit code for this error.
    ///
    /// A failing external tool's own non-zero status is passed through.
    pub fn exit_code(&self) -> u8 {
        match self {
            PrepError::ExternalTool {
                status: Some(code), ..
            } if *code != 0 => u8::try_from(*code & 0xff).ok().filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = PrepError::ConfigInvalidValue {
            key: "segment.interval".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for segment.interval: must be positive"
        );
    }

    #[test]
    fn test_missing_input_display() {
        let error = PrepError::MissingInput {
            path: "/audio".to_string(),
            reason: "directory is empty".to_string(),
        };
        assert_eq!(error.to_string(), "Missing input /audio: directory is empty");
    }

    #[test]
    fn test_external_tool_display_with_status() {
        let error = PrepError::ExternalTool {
            tool: "fap".to_string(),
            status: Some(2),
            message: "bad input".to_string(),
        };
        assert_eq!(error.to_string(), "fap failed with exit code 2: bad input");
    }

    #[test]
    fn test_external_tool_display_without_status() {
        let error = PrepError::ExternalTool {
            tool: "ffmpeg".to_string(),
            status: None,
            message: "killed by signal".to_string(),
        };
        assert_eq!(error.to_string(), "ffmpeg failed: killed by signal");
    }

    #[test]
    fn test_tool_timeout_display_keeps_sub_second_limits() {
        let error = PrepError::ToolTimeout {
            tool: "ffmpeg".to_string(),
            after: Duration::from_millis(300),
        };
        assert_eq!(error.to_string(), "ffmpeg did not finish within 300ms");
        let error = PrepError::ToolTimeout {
            tool: "ffmpeg".to_string(),
            after: Duration::from_secs(120),
        };
        assert_eq!(error.to_string(), "ffmpeg did not finish within 2m");
    }

    #[test]
    fn test_unit_collision_is_an_input_problem() {
        let error = PrepError::UnitCollision {
            unit: "00001_00-00-00~00-00-35".to_string(),
            existing: "a_00001_00-00-00~00-00-35.wav".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::MissingInput);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            PrepError::MissingArgument {
                flag: "--model-name".to_string()
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            PrepError::MissingInput {
                path: "x".to_string(),
                reason: "absent".to_string()
            }
            .kind(),
            ErrorKind::MissingInput
        );
        assert_eq!(
            PrepError::ToolTimeout {
                tool: "ffmpeg".to_string(),
                after: Duration::from_secs(5)
            }
            .kind(),
            ErrorKind::ExternalTool
        );
        assert_eq!(
            PrepError::Other("x".to_string()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_exit_code_propagates_tool_status() {
        let error = PrepError::ExternalTool {
            tool: "fap".to_string(),
            status: Some(3),
            message: String::new(),
        };
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_defaults_to_one() {
        assert_eq!(
            PrepError::MissingArgument {
                flag: "--copy-source-raw-directory".to_string()
            }
            .exit_code(),
            1
        );
        let no_status = PrepError::ExternalTool {
            tool: "fap".to_string(),
            status: None,
            message: String::new(),
        };
        assert_eq!(no_status.exit_code(), 1);
        let wraps_to_zero = PrepError::ExternalTool {
            tool: "fap".to_string(),
            status: Some(256),
            message: String::new(),
        };
        assert_eq!(wraps_to_zero.exit_code(), 1);
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: PrepError = io_error.into();
        assert!(error.to_string().contains("file not found"));
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: PrepError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PrepError>();
        assert_sync::<PrepError>();
    }
}
