//! Group each normalized segment with its transcript into a unit directory.
//!
//! `before_text_reformatting/<NNNNN>_<HH-MM-SS>~<HH-MM-SS>/` holds exactly one
//! audio file and one transcript, both under their original names. A unit that
//! ends up with only one of the two is reported as incomplete so a later run
//! can fill it in.

use crate::defaults;
use crate::error::{PrepError, Result};
use crate::gate;
use crate::layout::{PathLayout, SegmentName};
use crate::stages::{Stage, StageReport, audio_files, utf8_file_name};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReformatConfig {
    /// Extension of the transcripts to pair, without the dot.
    pub transcript_extension: String,
    pub force: bool,
}

impl Default for ReformatConfig {
    fn default() -> Self {
        Self {
            transcript_extension: defaults::TRANSCRIPTION_EXTENSION.to_string(),
            force: false,
        }
    }
}

/// Reformat the layout's normalized audio and transcripts.
pub fn reformat(layout: &PathLayout, config: &ReformatConfig) -> Result<StageReport> {
    reformat_dirs(
        &layout.normalize_loudness,
        &layout.transcriptions,
        &layout.before_text_reformatting,
        config,
    )
}

/// Build one unit per audio file of `normalize_dir` under `out_dir`.
///
/// Both copies are gated independently. Files whose name is not a segment
/// name, units that cannot be written, and units already taken by another
/// source's segment are logged and recorded as failures; incomplete units are
/// listed in [`StageReport::incomplete`].
pub fn reformat_dirs(
    normalize_dir: &Path,
    transcribe_dir: &Path,
    out_dir: &Path,
    config: &ReformatConfig,
) -> Result<StageReport> {
    std::fs::create_dir_all(out_dir)?;
    let mut report = StageReport::new(Stage::Reformat);

    for audio in audio_files(normalize_dir)? {
        let name = match SegmentName::from_path(&audio) {
            Ok(name) => name,
            Err(e) => {
                warn!(path = %audio.display(), error = %e, "cannot place file in a unit");
                report.record_failure(&audio, &e);
                continue;
            }
        };
        let unit = out_dir.join(name.unit_dir_name());
        if let Err(e) = build_unit(&audio, &name, &unit, transcribe_dir, config, &mut report) {
            warn!(path = %audio.display(), unit = %unit.display(), error = %e, "unit not built");
            report.record_failure(&audio, &e);
        }
    }

    info!(
        written = report.processed,
        skipped = report.skipped,
        failed = report.failed.len(),
        incomplete = report.incomplete.len(),
        "reformatting finished"
    );
    Ok(report)
}

fn build_unit(
    audio: &Path,
    name: &SegmentName,
    unit: &Path,
    transcribe_dir: &Path,
    config: &ReformatConfig,
    report: &mut StageReport,
) -> Result<()> {
    let audio_name = utf8_file_name(audio)?;
    std::fs::create_dir_all(unit)?;
    if let Some(existing) = foreign_audio(unit, audio_name)? {
        return Err(PrepError::UnitCollision {
            unit: unit.display().to_string(),
            existing,
        });
    }

    let audio_target = unit.join(audio_name);
    copy_gated(audio, &audio_target, config.force, report)?;

    let transcript_name = format!("{}.{}", name.stem(), config.transcript_extension);
    let transcript = transcribe_dir.join(&transcript_name);
    let transcript_target = unit.join(&transcript_name);
    if transcript.is_file() {
        copy_gated(&transcript, &transcript_target, config.force, report)?;
    } else {
        warn!(path = %transcript.display(), "no transcript for segment");
    }

    if !(audio_target.is_file() && transcript_target.is_file()) {
        warn!(path = %unit.display(), "unit is incomplete");
        report.incomplete.push(unit.to_path_buf());
    }
    Ok(())
}

/// Name of an audio file in `unit` other than `audio_name`, if any.
fn foreign_audio(unit: &Path, audio_name: &str) -> Result<Option<String>> {
    Ok(audio_files(unit)?
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .find(|n| *n != audio_name)
        .map(str::to_string))
}

fn copy_gated(from: &Path, to: &Path, force: bool, report: &mut StageReport) -> Result<()> {
    if !gate::should_process(to, force)? {
        report.record(false);
        return Ok(());
    }
    std::fs::copy(from, to)?;
    debug!(from = %from.display(), to = %to.display(), "copied");
    report.record(true);
    Ok(())
}
