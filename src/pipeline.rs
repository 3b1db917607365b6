//! Stage orchestration.
//!
//! Runs Copy → Segment → Normalize → Transcribe → Reformat over one dataset,
//! optionally followed by the fine-tune hand-off behind a confirmation step:
//!
//! ```text
//! source dir ─copy─▶ raw/ ─segment─▶ raw/separate/ ─normalize─▶ normalize_loudness/
//!   ─transcribe─▶ transcriptions/ ─reformat─▶ before_text_reformatting/ ─▶ fish-speech
//! ```
//!
//! Fatal: missing copy source, normalizer failure, any fine-tune step failure.
//! Everything else is per item and ends up in the [`PipelineReport`].

use crate::error::{PrepError, Result};
use crate::gate::{MarkerFileStore, StageStatusStore};
use crate::layout::PathLayout;
use crate::stages::{
    self, CopyConfig, FinetuneConfig, NormalizeConfig, ReformatConfig, SegmentConfig, Stage,
    StageReport, TranscribeConfig,
};
use crate::tools::cutter::AudioCutter;
use crate::tools::normalizer::LoudnessNormalizer;
use crate::tools::probe::DurationProbe;
use crate::tools::trainer::Trainer;
use crate::tools::transcriber::Transcriber;
use std::cell::RefCell;
use std::io::{BufRead, Write};
use tracing::info;

/// Asks whether to continue into fine-tuning.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Always answers yes (`--yes`, tests, automation).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        eprint!("{prompt} [y/N] ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(is_yes(&line))
    }
}

/// Reads answers from any buffered reader, one line per question. End of
/// input counts as "no".
#[derive(Debug)]
pub struct ReaderConfirmation<R: BufRead> {
    input: RefCell<R>,
}

impl<R: BufRead> ReaderConfirmation<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: RefCell::new(input),
        }
    }
}

impl<R: BufRead> Confirmation for ReaderConfirmation<R> {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        let mut line = String::new();
        self.input.borrow_mut().read_line(&mut line)?;
        Ok(is_yes(&line))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// External tools the stages delegate to.
pub struct Collaborators {
    pub probe: Box<dyn DurationProbe>,
    pub cutter: Box<dyn AudioCutter>,
    pub normalizer: Box<dyn LoudnessNormalizer>,
    pub transcriber: Box<dyn Transcriber>,
    pub trainer: Box<dyn Trainer>,
}

/// Per-stage configuration for one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Required when the copy stage runs.
    pub copy: Option<CopyConfig>,
    pub segment: SegmentConfig,
    pub normalize: NormalizeConfig,
    pub transcribe: TranscribeConfig,
    pub reformat: ReformatConfig,
    /// Set to hand off to fine-tuning after preparation.
    pub finetune: Option<FinetuneConfig>,
    /// Run only this stage.
    pub only: Option<Stage>,
}

impl PipelineConfig {
    /// Stages this configuration runs, in order.
    pub fn planned_stages(&self) -> Vec<Stage> {
        match self.only {
            Some(stage) => vec![stage],
            None => {
                let mut stages = Stage::PREPARATION.to_vec();
                if self.finetune.is_some() {
                    stages.push(Stage::Finetune);
                }
                stages
            }
        }
    }
}

/// Outcome of a run, one report per stage that was reached.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// True when some item failed or a unit was left incomplete.
    pub fn has_item_failures(&self) -> bool {
        self.stages.iter().any(|r| !r.is_clean())
    }
}

pub struct Pipeline {
    layout: PathLayout,
    config: PipelineConfig,
    tools: Collaborators,
    store: Box<dyn StageStatusStore>,
    confirmation: Box<dyn Confirmation>,
}

impl Pipeline {
    /// Pipeline with on-disk stage markers and an interactive confirmation.
    pub fn new(layout: PathLayout, config: PipelineConfig, tools: Collaborators) -> Self {
        let store = Box::new(MarkerFileStore::new(&layout));
        Self {
            layout,
            config,
            tools,
            store,
            confirmation: Box::new(StdinConfirmation),
        }
    }

    pub fn with_status_store(mut self, store: Box<dyn StageStatusStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_confirmation(mut self, confirmation: Box<dyn Confirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the planned stages in order, stopping at the first fatal error.
    pub fn run(&mut self) -> Result<PipelineReport> {
        let planned = self.config.planned_stages();
        if planned.contains(&Stage::Copy) && self.config.copy.is_none() {
            return Err(PrepError::MissingArgument {
                flag: "--copy-source-raw-directory".to_string(),
            });
        }
        if planned.contains(&Stage::Finetune) && self.config.finetune.is_none() {
            return Err(PrepError::MissingArgument {
                flag: "--model-name".to_string(),
            });
        }

        self.layout.ensure_dirs()?;
        info!(root = %self.layout.root.display(), stages = ?planned, "pipeline starting");

        let mut report = PipelineReport::default();
        for stage in planned {
            let stage_report = self.run_stage(stage)?;
            info!("{stage_report}");
            report.stages.push(stage_report);
        }
        Ok(report)
    }

    fn run_stage(&mut self, stage: Stage) -> Result<StageReport> {
        info!(stage = %stage, "stage starting");
        let layout = &self.layout;
        match stage {
            Stage::Copy => match &self.config.copy {
                Some(copy) => stages::copy_sources(layout, copy),
                None => Err(PrepError::MissingArgument {
                    flag: "--copy-source-raw-directory".to_string(),
                }),
            },
            Stage::Segment => stages::segment(
                layout,
                &self.config.segment,
                self.tools.probe.as_ref(),
                self.tools.cutter.as_ref(),
            ),
            Stage::Normalize => stages::normalize(
                layout,
                &self.config.normalize,
                self.tools.normalizer.as_ref(),
                self.store.as_mut(),
            ),
            Stage::Transcribe => stages::transcribe(
                layout,
                &self.config.transcribe,
                self.tools.transcriber.as_ref(),
            ),
            Stage::Reformat => stages::reformat(layout, &self.config.reformat),
            Stage::Finetune => self.hand_off(),
        }
    }

    fn hand_off(&self) -> Result<StageReport> {
        let Some(finetune) = &self.config.finetune else {
            return Err(PrepError::MissingArgument {
                flag: "--model-name".to_string(),
            });
        };
        // An explicit "only finetune" run needs no second confirmation.
        if self.config.only != Some(Stage::Finetune)
            && !self
                .confirmation
                .confirm("Data preparation finished. Continue to fine-tuning?")?
        {
            info!("fine-tuning declined");
            return Ok(StageReport::new(Stage::Finetune).with_note("declined"));
        }
        stages::run_finetune(&self.layout, finetune, self.tools.trainer.as_ref())
    }
}
