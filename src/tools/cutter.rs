//! Audio cutting collaborator.

use crate::error::{PrepError, Result};
use crate::tools::executor::{CommandExecutor, SystemCommandExecutor, path_arg};
use crate::tools::probe::{AudioDurationProbe, DurationProbe};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Cuts `[start, start + duration)` out of `input` into `output`.
///
/// Implementations clamp windows that run past the end of the input. When
/// nothing at all is left at `start` they fail with `InputExhausted` and leave
/// no output file behind.
pub trait AudioCutter: Send + Sync {
    fn cut(&self, input: &Path, start_secs: u64, duration_secs: u64, output: &Path) -> Result<()>;
}

/// `ffmpeg` based cutter.
///
/// ffmpeg writes into `<output>.partial`, which is probed and only renamed to
/// `output` once it holds audio. A missing, empty or zero-length cut means the
/// input is exhausted. A failed or timed-out cut leaves neither file behind, so
/// the next run cuts that window again.
#[derive(Debug, Clone)]
pub struct FfmpegCutter<E: CommandExecutor, P: DurationProbe> {
    executor: E,
    program: String,
    probe: P,
}

impl<E: CommandExecutor, P: DurationProbe> FfmpegCutter<E, P> {
    pub fn new(executor: E, program: impl Into<String>, probe: P) -> Self {
        Self {
            executor,
            program: program.into(),
            probe,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn exhausted(output: &Path) -> Result<()> {
        Err(PrepError::InputExhausted {
            path: output.display().to_string(),
        })
    }

    fn run_ffmpeg(
        &self,
        input: &Path,
        start_secs: u64,
        duration_secs: u64,
        partial: &Path,
        output: &Path,
    ) -> Result<()> {
        let start = start_secs.to_string();
        let duration = duration_secs.to_string();
        // The `.partial` suffix hides the container from ffmpeg.
        let format = muxer_for(output);
        self.executor.execute(
            &self.program,
            &[
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-ss",
                &start,
                "-t",
                &duration,
                "-i",
                path_arg(input)?,
                "-f",
                &format,
                path_arg(partial)?,
            ],
        )?;

        let size = std::fs::metadata(partial).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Self::exhausted(output);
        }
        match self.probe.duration_secs(partial) {
            Ok(0) => Self::exhausted(output),
            Ok(_) => Ok(()),
            Err(e @ PrepError::ToolNotFound { .. }) => Err(e),
            Err(e) => {
                debug!(path = %partial.display(), error = %e, "cut output is unreadable");
                Self::exhausted(output)
            }
        }
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn muxer_for(output: &Path) -> String {
    output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "wav".to_string())
}

fn discard(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!(path = %path.display(), error = %e, "cannot remove unfinished cut");
    }
}

impl FfmpegCutter<SystemCommandExecutor, AudioDurationProbe<SystemCommandExecutor>> {
    /// System ffmpeg bounded by `max_wait` per cut.
    pub fn system(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        max_wait: Option<Duration>,
    ) -> Self {
        let mut executor = SystemCommandExecutor::new();
        if let Some(max_wait) = max_wait {
            executor = executor.with_timeout(max_wait);
        }
        Self::new(executor, ffmpeg, AudioDurationProbe::system(ffprobe))
    }
}

impl<E: CommandExecutor, P: DurationProbe> AudioCutter for FfmpegCutter<E, P> {
    fn cut(&self, input: &Path, start_secs: u64, duration_secs: u64, output: &Path) -> Result<()> {
        let partial = partial_path(output);
        if let Err(e) = self.run_ffmpeg(input, start_secs, duration_secs, &partial, output) {
            discard(&partial);
            discard(output);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&partial, output) {
            discard(&partial);
            return Err(e.into());
        }
        Ok(())
    }
}
