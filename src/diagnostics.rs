//! System diagnostics and dependency checking.
//!
//! Verifies that the external programs the pipeline shells out to are
//! installed and answer a version query.

use crate::config::Config;
use crate::defaults;
use std::path::PathBuf;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working, with its resolved location
    Ok(PathBuf),
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues (e.g., version query failed)
    Warning(String),
}

/// Locate `program` on `PATH` (or as given, when it is a path) and run it
/// with `version_arg`.
pub fn check_command(program: &str, version_arg: &str) -> CheckResult {
    let resolved = match which::which(program) {
        Ok(path) => path,
        Err(_) => return CheckResult::NotFound,
    };
    match Command::new(&resolved).arg(version_arg).output() {
        Ok(output) if output.status.success() => CheckResult::Ok(resolved),
        Ok(_) => CheckResult::Warning(format!(
            "'{}' found but {} failed",
            resolved.display(),
            version_arg
        )),
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", program, e)),
    }
}

/// What each pipeline stage needs, in the order the stages run.
fn required_tools(config: &Config) -> Vec<(&'static str, &str, &'static str)> {
    vec![
        ("segment", config.tools.ffmpeg.as_str(), "-version"),
        ("probe", config.tools.ffprobe.as_str(), "-version"),
        ("normalize", config.tools.fap.as_str(), "--help"),
        ("transcribe", config.tools.whisper.as_str(), "--help"),
        ("finetune", config.tools.python.as_str(), "--version"),
    ]
}

/// Run all dependency checks and print results.
///
/// Returns the number of tools that were not found.
pub fn check_dependencies(config: &Config) -> usize {
    println!("Checking external tools...\n");

    let mut missing = 0;
    for (stage, program, version_arg) in required_tools(config) {
        print!("{:<11} {}: ", stage, program);
        match check_command(program, version_arg) {
            CheckResult::Ok(path) => println!("✓ OK ({})", path.display()),
            CheckResult::NotFound => {
                missing += 1;
                println!("✗ NOT FOUND");
            }
            CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
        }
    }

    println!();
    println!("In-process whisper: {}", defaults::whisper_backend());
    let fish_speech = &config.finetune.fish_speech_dir;
    if fish_speech.join("fish_speech").is_dir() {
        println!("fish-speech:        ✓ {}", fish_speech.display());
    } else {
        println!(
            "fish-speech:        - no checkout at {} (only needed for finetune)",
            fish_speech.display()
        );
    }

    missing
}
