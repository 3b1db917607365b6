use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error};
use tuneprep::cli::{Cli, Commands, ConfigAction};
use tuneprep::config::Config;
use tuneprep::diagnostics::check_dependencies;
use tuneprep::error::PrepError;
use tuneprep::pipeline::PipelineReport;
use tuneprep::stages::StageReport;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tuneprep::logging::init(cli.verbose, cli.quiet);
    debug!(version = %tuneprep::version_string(), "tuneprep starting");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{} {:#}", "Error:".red(), e);
            let code = e
                .downcast_ref::<PrepError>()
                .map(PrepError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Prepare(args) => {
            let config = load_config(cli.config.as_deref())?;
            let report = tuneprep::app::run_prepare(config, &args)
                .with_context(|| format!("preparing dataset '{}'", args.model_name))?;
            print_pipeline_summary(&report);
        }
        Commands::Finetune(args) => {
            let config = load_config(cli.config.as_deref())?;
            let report = tuneprep::app::run_finetune(&config, &args)
                .with_context(|| format!("fine-tuning '{}'", args.model_name))?;
            print_stage_line(&report);
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if check_dependencies(&config) > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "tuneprep",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/tuneprep/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
            .with_context(|| format!("reading {}", default_path.display()))?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn print_pipeline_summary(report: &PipelineReport) {
    for stage in &report.stages {
        print_stage_line(stage);
    }
    if report.has_item_failures() {
        println!(
            "{}",
            "Some items failed; rerun to retry them (finished outputs are kept).".yellow()
        );
    }
}

fn print_stage_line(report: &StageReport) {
    let mark = if !report.failed.is_empty() {
        "✗".red().to_string()
    } else if !report.incomplete.is_empty() {
        "⚠".yellow().to_string()
    } else {
        "✓".green().to_string()
    };
    println!("{mark} {report}");
    for (path, reason) in &report.failed {
        println!("    {} {}", path.display().dimmed(), reason);
    }
    for path in &report.incomplete {
        println!("    {} {}", path.display().dimmed(), "incomplete".yellow());
    }
}
