//! Duration probes: how long is a source recording, in whole seconds.

use crate::error::{PrepError, Result};
use crate::tools::executor::{CommandExecutor, SystemCommandExecutor, path_arg};
use std::path::Path;

/// Measures audio duration. Fractional seconds are rounded up so a short tail
/// still falls inside the last window.
pub trait DurationProbe: Send + Sync {
    fn duration_secs(&self, path: &Path) -> Result<u64>;
}

/// Reads the WAV header with hound; no subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDurationProbe;

impl DurationProbe for WavDurationProbe {
    fn duration_secs(&self, path: &Path) -> Result<u64> {
        let reader = hound::WavReader::open(path).map_err(|e| PrepError::ExternalTool {
            tool: "wav-probe".to_string(),
            status: None,
            message: format!("{}: {}", path.display(), e),
        })?;
        let rate = u64::from(reader.spec().sample_rate);
        if rate == 0 {
            return Err(PrepError::ExternalTool {
                tool: "wav-probe".to_string(),
                status: None,
                message: format!("{}: sample rate is zero", path.display()),
            });
        }
        Ok(u64::from(reader.duration()).div_ceil(rate))
    }
}

/// Asks `ffprobe` for the container duration.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe<E: CommandExecutor> {
    executor: E,
    program: String,
}

impl<E: CommandExecutor> FfprobeDurationProbe<E> {
    pub fn new(executor: E, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl FfprobeDurationProbe<SystemCommandExecutor> {
    pub fn system(program: impl Into<String>) -> Self {
        Self::new(SystemCommandExecutor::new(), program)
    }
}

impl<E: CommandExecutor> DurationProbe for FfprobeDurationProbe<E> {
    fn duration_secs(&self, path: &Path) -> Result<u64> {
        let output = self.executor.execute(
            &self.program,
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                path_arg(path)?,
            ],
        )?;
        parse_seconds(&output).ok_or_else(|| PrepError::ExternalTool {
            tool: self.program.clone(),
            status: None,
            message: format!(
                "unexpected duration '{}' for {}",
                output.trim(),
                path.display()
            ),
        })
    }
}

/// Parse ffprobe's decimal seconds, rounding up.
pub fn parse_seconds(text: &str) -> Option<u64> {
    let value: f64 = text.trim().lines().next()?.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.ceil() as u64)
}

/// WAV through hound, everything else (or a WAV hound cannot read) through ffprobe.
#[derive(Debug, Clone)]
pub struct AudioDurationProbe<E: CommandExecutor> {
    wav: WavDurationProbe,
    ffprobe: FfprobeDurationProbe<E>,
}

impl<E: CommandExecutor> AudioDurationProbe<E> {
    pub fn new(ffprobe: FfprobeDurationProbe<E>) -> Self {
        Self {
            wav: WavDurationProbe,
            ffprobe,
        }
    }
}

impl AudioDurationProbe<SystemCommandExecutor> {
    pub fn system(ffprobe_program: impl Into<String>) -> Self {
        Self::new(FfprobeDurationProbe::system(ffprobe_program))
    }
}

impl<E: CommandExecutor> DurationProbe for AudioDurationProbe<E> {
    fn duration_secs(&self, path: &Path) -> Result<u64> {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if is_wav {
            match self.wav.duration_secs(path) {
                Ok(secs) => return Ok(secs),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "hound could not read WAV, asking ffprobe");
                }
            }
        }
        self.ffprobe.duration_secs(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mock::{MockCommandExecutor, write_test_wav};
    use tempfile::TempDir;

    #[test]
    fn wav_probe_rounds_up() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wav");
        // 2.5 seconds at 8 kHz
        write_test_wav(&path, 8000, 20_000);
        assert_eq!(WavDurationProbe.duration_secs(&path).unwrap(), 3);
    }

    #[test]
    fn wav_probe_exact_seconds() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wav");
        write_test_wav(&path, 8000, 16_000);
        assert_eq!(WavDurationProbe.duration_secs(&path).unwrap(), 2);
    }

    #[test]
    fn wav_probe_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wav");
        std::fs::write(&path, b"not a wav").unwrap();
        assert!(WavDurationProbe.duration_secs(&path).is_err());
    }

    #[test]
    fn ffprobe_parses_output() {
        let mock = MockCommandExecutor::new().with_response("100.4\n");
        let probe = FfprobeDurationProbe::new(mock, "ffprobe");
        assert_eq!(probe.duration_secs(Path::new("x.mp3")).unwrap(), 101);

        let calls = probe.executor().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ffprobe");
        assert_eq!(calls[0].1.last().map(String::as_str), Some("x.mp3"));
    }

    #[test]
    fn ffprobe_rejects_non_numeric_output() {
        let mock = MockCommandExecutor::new().with_response("N/A\n");
        let probe = FfprobeDurationProbe::new(mock, "ffprobe");
        assert!(matches!(
            probe.duration_secs(Path::new("x.mp3")),
            Err(PrepError::ExternalTool { .. })
        ));
    }

    #[test]
    fn parse_seconds_edge_cases() {
        assert_eq!(parse_seconds("0"), Some(0));
        assert_eq!(parse_seconds("  30.000000 "), Some(30));
        assert_eq!(parse_seconds("30.000001"), Some(31));
        assert_eq!(parse_seconds("-1"), None);
        assert_eq!(parse_seconds("inf"), None);
        assert_eq!(parse_seconds(""), None);
    }

    #[test]
    fn audio_probe_uses_hound_for_wav() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wav");
        write_test_wav(&path, 8000, 8000);

        let probe = AudioDurationProbe::new(FfprobeDurationProbe::new(
            MockCommandExecutor::new(),
            "ffprobe",
        ));
        assert_eq!(probe.duration_secs(&path).unwrap(), 1);
        assert_eq!(probe.ffprobe.executor().call_count(), 0);
    }

    #[test]
    fn audio_probe_falls_back_to_ffprobe() {
        let probe = AudioDurationProbe::new(FfprobeDurationProbe::new(
            MockCommandExecutor::new()
                .with_response("42.0")
                .with_response("7.2"),
            "ffprobe",
        ));
        assert_eq!(probe.duration_secs(Path::new("talk.mp3")).unwrap(), 42);
        // unreadable WAV also goes to ffprobe
        assert_eq!(probe.duration_secs(Path::new("missing.wav")).unwrap(), 8);
        assert_eq!(probe.ffprobe.executor().call_count(), 2);
    }
}
