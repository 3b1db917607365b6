//! Subprocess execution behind a trait so every external tool can be mocked.

use crate::error::{PrepError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync. Production code uses [`SystemCommandExecutor`];
/// tests use [`MockCommandExecutor`](crate::tools::mock::MockCommandExecutor).
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// Returns stdout on success. A missing program is `ToolNotFound`, a
    /// non-zero exit is `ExternalTool` carrying the status.
    fn execute(&self, program: &str, args: &[&str]) -> Result<String>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).execute(program, args)
    }
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Box<T> {
    fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).execute(program, args)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines of stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

/// Production command executor using `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and fail with `ToolTimeout` once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run every command from `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    fn spawn_error(program: &str, e: std::io::Error) -> PrepError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PrepError::ToolNotFound {
                tool: program.to_string(),
            }
        } else {
            PrepError::ExternalTool {
                tool: program.to_string(),
                status: None,
                message: format!("failed to start: {e}"),
            }
        }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Self::spawn_error(program, e))?;

        // Drain both pipes on their own threads so a chatty child never blocks on a full pipe.
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let status = wait_with_deadline(&mut child, self.timeout).map_err(|e| {
            PrepError::ExternalTool {
                tool: program.to_string(),
                status: None,
                message: format!("failed to wait: {e}"),
            }
        })?;

        let Some(status) = status else {
            // Grandchildren may still hold the pipes; leave the drain threads to finish on their own.
            drop(stdout_reader);
            drop(stderr_reader);
            return Err(PrepError::ToolTimeout {
                tool: program.to_string(),
                after: self.timeout.unwrap_or_default(),
            });
        };

        let stdout = join_output(stdout_reader);
        let stderr = join_output(stderr_reader);

        if !status.success() {
            return Err(PrepError::ExternalTool {
                tool: program.to_string(),
                status: status.code(),
                message: stderr_tail(&stderr),
            });
        }

        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error only truncates diagnostics; the exit status still decides success.
        pipe.read_to_end(&mut buf).ok();
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Wait for `child`, killing it when `timeout` passes. `Ok(None)` means it timed out.
fn wait_with_deadline(
    child: &mut std::process::Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no error output".to_string()
    } else {
        tail
    }
}

/// Borrow a path as a UTF-8 command argument.
pub fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| PrepError::InvalidParameter {
        name: "path".to_string(),
        message: format!("{} is not valid UTF-8", path.display()),
    })
}
