//! Composition root.
//!
//! Turns the effective [`Config`] plus parsed command-line arguments into
//! concrete tool adapters and runs them:
//! flags → config → collaborators → pipeline

use crate::cli::{FinetuneArgs, PrepareArgs};
use crate::config::{Config, TranscribeBackend};
use crate::error::{PrepError, Result};
use crate::layout::PathLayout;
use crate::pipeline::{AlwaysConfirm, Collaborators, Pipeline, PipelineReport};
use crate::stages::{self, StageReport};
use crate::tools::{
    AudioDurationProbe, FapNormalizer, FfmpegCutter, FishSpeechTrainer, Trainer, Transcriber,
    WhisperCliTranscriber,
};
use tracing::{debug, info};

/// Build the transcriber selected by `transcribe.backend`.
pub fn build_transcriber(config: &Config) -> Result<Box<dyn Transcriber>> {
    let transcribe = &config.transcribe;
    match transcribe.backend {
        TranscribeBackend::WhisperCli => Ok(Box::new(WhisperCliTranscriber::system(
            config.tools.whisper.as_str(),
            transcribe.model.as_str(),
            transcribe.language.as_str(),
        ))),
        #[cfg(feature = "whisper")]
        TranscribeBackend::WhisperRs => {
            use crate::tools::whisper::{
                WhisperConfig, WhisperRsTranscriber, default_model_dir, model_path,
            };
            let model_dir = transcribe
                .model_dir
                .clone()
                .unwrap_or_else(default_model_dir);
            Ok(Box::new(WhisperRsTranscriber::new(WhisperConfig {
                model_path: model_path(&model_dir, &transcribe.model),
                language: transcribe.language.clone(),
                ..WhisperConfig::default()
            })))
        }
        #[cfg(not(feature = "whisper"))]
        TranscribeBackend::WhisperRs => Err(PrepError::ConfigInvalidValue {
            key: "transcribe.backend".to_string(),
            message: "whisper-rs requires a build with the `whisper` feature".to_string(),
        }),
    }
}

fn build_trainer(config: &Config) -> Box<dyn Trainer> {
    Box::new(FishSpeechTrainer::system(
        config.finetune.fish_speech_dir.clone(),
        config.finetune.settings(&config.tools.python),
    ))
}

/// Real tool adapters for every stage.
pub fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let cut_timeout = config.segment.cut_timeout()?;
    debug!(?cut_timeout, backend = ?config.transcribe.backend, "building tool adapters");
    Ok(Collaborators {
        probe: Box::new(AudioDurationProbe::system(config.tools.ffprobe.as_str())),
        cutter: Box::new(FfmpegCutter::system(
            config.tools.ffmpeg.as_str(),
            config.tools.ffprobe.as_str(),
            Some(cut_timeout),
        )),
        normalizer: Box::new(FapNormalizer::system(config.tools.fap.as_str())),
        transcriber: build_transcriber(config)?,
        trainer: build_trainer(config),
    })
}

/// Run `tuneprep prepare`: apply flag overrides, then run the pipeline.
pub fn run_prepare(mut config: Config, args: &PrepareArgs) -> Result<PipelineReport> {
    args.apply_overrides(&mut config);
    config.validate()?;

    let layout = PathLayout::new(&config.data_root, &args.model_name)?;
    let pipeline_config = args.pipeline_config(&config)?;
    info!(
        model = %args.model_name,
        root = %layout.root.display(),
        stages = ?pipeline_config.planned_stages(),
        "preparing dataset"
    );

    let mut pipeline = Pipeline::new(layout, pipeline_config, build_collaborators(&config)?);
    if args.yes {
        pipeline = pipeline.with_confirmation(Box::new(AlwaysConfirm));
    }
    pipeline.run()
}

/// Run `tuneprep finetune` on an already prepared dataset.
pub fn run_finetune(config: &Config, args: &FinetuneArgs) -> Result<StageReport> {
    let layout = PathLayout::new(&config.data_root, &args.model_name)?;
    let finetune = args.finetune_config(config);
    if let Some(path) = &finetune.override_path
        && !path.is_dir()
    {
        return Err(PrepError::MissingInput {
            path: path.display().to_string(),
            reason: "--override-path is not a directory".to_string(),
        });
    }
    stages::run_finetune(&layout, &finetune, build_trainer(config).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::stages::Stage;
    use clap::Parser;
    use tempfile::TempDir;

    fn prepare_args(args: &[&str]) -> PrepareArgs {
        let mut argv = vec!["tuneprep", "prepare", "--model-name", "alice"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Prepare(args) => args,
            other => panic!("Expected Prepare, got {:?}", other),
        }
    }

    fn config_in(tmp: &TempDir) -> Config {
        Config {
            data_root: tmp.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config_builds_collaborators() {
        assert!(build_collaborators(&Config::default()).is_ok());
    }

    #[test]
    fn test_bad_cut_timeout_is_rejected() {
        let mut config = Config::default();
        config.segment.cut_timeout = "whenever".to_string();
        assert!(matches!(
            build_collaborators(&config),
            Err(PrepError::ConfigInvalidValue { .. })
        ));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_rs_backend_needs_feature() {
        let mut config = Config::default();
        config.transcribe.backend = TranscribeBackend::WhisperRs;
        assert!(build_transcriber(&config).is_err());
    }

    #[test]
    fn test_full_prepare_without_source_fails_early() {
        let tmp = TempDir::new().unwrap();
        let result = run_prepare(config_in(&tmp), &prepare_args(&[]));
        assert!(matches!(result, Err(PrepError::MissingArgument { .. })));
        assert!(!tmp.path().join("alice").exists());
    }

    #[test]
    fn test_reformat_only_runs_on_empty_dataset() {
        let tmp = TempDir::new().unwrap();
        let report = run_prepare(
            config_in(&tmp),
            &prepare_args(&["--before-text-reformatting-only"]),
        )
        .unwrap();

        assert_eq!(report.stages.len(), 1);
        let reformat = report.stage(Stage::Reformat).unwrap();
        assert_eq!(reformat.processed, 0);
        assert!(tmp.path().join("alice/before_text_reformatting").is_dir());
    }

    #[test]
    fn test_invalid_override_is_rejected_before_running() {
        let tmp = TempDir::new().unwrap();
        let result = run_prepare(
            config_in(&tmp),
            &prepare_args(&["--transcription-extension", ".lab", "--copy-only"]),
        );
        assert!(matches!(result, Err(PrepError::ConfigInvalidValue { .. })));
    }

    #[test]
    fn test_finetune_requires_prepared_input() {
        let tmp = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(["tuneprep", "finetune", "--model-name", "alice"]).unwrap();
        let Commands::Finetune(args) = cli.command else {
            panic!("Expected Finetune");
        };
        assert!(matches!(
            run_finetune(&config_in(&tmp), &args),
            Err(PrepError::MissingInput { .. })
        ));
    }
}
