//! Loudness normalization collaborator.

use crate::error::Result;
use crate::tools::executor::{CommandExecutor, SystemCommandExecutor, path_arg};
use std::path::Path;

/// Normalizes every file of `input_dir` into `output_dir` in one invocation.
pub trait LoudnessNormalizer: Send + Sync {
    fn normalize(&self, input_dir: &Path, output_dir: &Path, loudness_target: f64) -> Result<()>;
}

/// fish-audio-preprocess: `fap loudness-norm IN OUT --clean --loudness T`.
#[derive(Debug, Clone)]
pub struct FapNormalizer<E: CommandExecutor> {
    executor: E,
    program: String,
}

impl<E: CommandExecutor> FapNormalizer<E> {
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

impl FapNormalizer<SystemCommandExecutor> {
    pub fn system(program: impl Into<String>) -> Self {
        Self::new(SystemCommandExecutor::new(), program)
    }
}

impl<E: CommandExecutor> LoudnessNormalizer for FapNormalizer<E> {
    fn normalize(&self, input_dir: &Path, output_dir: &Path, loudness_target: f64) -> Result<()> {
        let target = loudness_target.to_string();
        self.executor.execute(
            &self.program,
            &[
                "loudness-norm",
                path_arg(input_dir)?,
                path_arg(output_dir)?,
                "--clean",
                "--loudness",
                &target,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;
    use crate::tools::mock::MockCommandExecutor;

    #[test]
    fn builds_fap_command() {
        let normalizer = FapNormalizer::new(MockCommandExecutor::new(), "fap");
        normalizer
            .normalize(Path::new("sep"), Path::new("norm"), -23.0)
            .unwrap();

        let calls = normalizer.executor().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "fap");
        assert_eq!(
            calls[0].1,
            vec!["loudness-norm", "sep", "norm", "--clean", "--loudness", "-23"]
        );
    }

    #[test]
    fn fractional_target_is_kept() {
        let normalizer = FapNormalizer::new(MockCommandExecutor::new(), "fap");
        normalizer
            .normalize(Path::new("a"), Path::new("b"), -16.5)
            .unwrap();
        assert_eq!(normalizer.executor().calls()[0].1[5], "-16.5");
    }

    #[test]
    fn failure_propagates() {
        let normalizer = FapNormalizer::new(
            MockCommandExecutor::new().with_error(PrepError::ToolNotFound {
                tool: "fap".to_string(),
            }),
            "fap",
        );
        assert!(matches!(
            normalizer.normalize(Path::new("a"), Path::new("b"), -23.0),
            Err(PrepError::ToolNotFound { .. })
        ));
    }
}
