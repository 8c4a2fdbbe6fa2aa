//! Command-line interface module for cloudtidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (`clap` derive)
//! - Configuration loading and compilation
//! - Plan, execute and record orchestration
//! - Undo, history, suggest and classify commands

use crate::config::{CompiledConfig, Config, ConfigError};
use crate::file_category::{Categorizer, NullSink, TracingSink};
use crate::file_organizer::{Executor, MoveError, Mover};
use crate::file_record::FileRecord;
use crate::local_drive::{FileSource, LocalDrive, SourceError};
use crate::output::OutputFormatter;
use crate::path_template::join_path;
use crate::planner::MovePlanner;
use crate::undo::{HistoryError, HistoryStore};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "cloudtidy", version)]
#[command(about = "Rule-based file categorization and organization", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./.cloudtidy.toml, then ~/.config/cloudtidy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: OrganizeCommand,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum OrganizeCommand {
    /// Classify files and move them into the organized structure
    Organize {
        dir: PathBuf,
        /// Compute and show the plan without moving anything
        #[arg(long)]
        dry_run: bool,
        /// Override the configured batch limit
        #[arg(long)]
        max_files: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Revert a recorded run
    Undo { dir: PathBuf, operation_id: String },
    /// List recorded runs, newest first
    History {
        dir: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Only show runs from the last N days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Suggest new keywords from file names and show the category breakdown
    Suggest {
        dir: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Show how file names would be categorized
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Errors that end a CLI command with a non-zero exit.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid folder structure: {0}")]
    Layout(#[from] regex::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runs a command with configuration discovered the default way.
///
/// # Examples
///
/// ```no_run
/// use cloudtidy::cli::{run_cli, OrganizeCommand};
///
/// let command = OrganizeCommand::Organize {
///     dir: "/path/to/drive".into(),
///     dry_run: true,
///     max_files: None,
///     json: false,
/// };
/// if let Err(e) = run_cli(command) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: OrganizeCommand) -> Result<(), CliError> {
    run_cli_with_config(command, None)
}

/// Runs a command with an optional explicit configuration file.
pub fn run_cli_with_config(
    command: OrganizeCommand,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let compiled = load_config(config_path)?;

    match command {
        OrganizeCommand::Organize {
            dir,
            dry_run,
            max_files,
            json,
        } => organize(&dir, compiled, dry_run, max_files, json),
        OrganizeCommand::Undo { dir, operation_id } => undo(&dir, &compiled, &operation_id),
        OrganizeCommand::History { dir, limit, days } => history(&dir, &compiled, limit, days),
        OrganizeCommand::Suggest { dir, top } => suggest(&dir, &compiled, top),
        OrganizeCommand::Classify { names } => {
            classify(&names, &compiled);
            Ok(())
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Result<CompiledConfig, CliError> {
    let compiled = Config::load(config_path)?.compile()?;
    for warning in &compiled.warnings {
        OutputFormatter::warning(&warning.to_string());
    }
    Ok(compiled)
}

fn history_store(base: &Path, compiled: &CompiledConfig) -> Result<HistoryStore, CliError> {
    Ok(HistoryStore::open(base.join(&compiled.history_dir))?)
}

/// Discovers files, leaving out anything stored in the history directory.
fn discover(drive: &LocalDrive, compiled: &CompiledConfig) -> Result<Vec<FileRecord>, CliError> {
    let mut files = drive.list_files("")?;
    if compiled.history_dir.is_relative()
        && let Some(history) = compiled.history_dir.to_str()
    {
        let prefix = format!("{}/", join_path([history]));
        files.retain(|f| !f.path.starts_with(&prefix));
    }
    Ok(files)
}

/// Plans a batch and executes it, or shows it when `dry_run` is set.
///
/// Live runs are recorded in the history store so they can be undone; dry
/// runs are not recorded.
fn organize(
    base: &Path,
    mut compiled: CompiledConfig,
    dry_run: bool,
    max_files: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    if max_files.is_some() {
        compiled.settings.limits.max_files_per_run = max_files;
    }

    let mut drive = LocalDrive::new(base)?;
    let files = discover(&drive, &compiled)?;
    let layout = compiled.settings.layout()?;
    let mut plan = MovePlanner::new(&compiled.registry, &compiled.settings).plan(
        &files,
        |f| layout.matches(&f.path),
        &mut TracingSink,
    );
    let report = plan.report();

    if !json {
        OutputFormatter::info(&format!("Organizing contents of: {}", base.display()));
        OutputFormatter::batch_report(&report);
    }

    if plan.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&json!({ "report": report }))?);
        } else {
            OutputFormatter::success("Nothing to organize.");
        }
        return Ok(());
    }

    if dry_run {
        let record = Executor::new(true).execute(&mut plan, &mut NoopMover);
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "report": report,
                    "dry_run": true,
                    "moves": record.moves,
                }))?
            );
        } else {
            OutputFormatter::planned_moves(&plan.operations);
            OutputFormatter::dry_run_notice("No files were modified.");
        }
        return Ok(());
    }

    let store = history_store(base, &compiled)?;
    let mut executor = Executor::new(false);
    let progress =
        (!json).then(|| OutputFormatter::create_progress_bar(plan.operations.len() as u64));
    if let Some(pb) = &progress {
        executor = executor.with_progress(pb.clone());
    }
    let record = executor.execute(&mut plan, &mut drive);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    store.record(&record)?;
    info!(id = %record.id, dir = %store.dir().display(), "Run recorded");

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "report": report,
                "operation_id": record.id,
                "status": record.status,
                "moved": record.files_moved(),
                "failures": record.failures,
            }))?
        );
        return Ok(());
    }

    for failure in &record.failures {
        OutputFormatter::error(&format!("{}: {}", failure.source, failure.reason));
    }
    if record.failures.is_empty() {
        OutputFormatter::success(&format!("Moved {} files.", record.files_moved()));
    } else {
        OutputFormatter::warning(&format!(
            "Moved {} files, {} failed. Please review errors above.",
            record.files_moved(),
            record.files_failed()
        ));
    }
    OutputFormatter::plain(&format!(
        "Operation id: {}. Use 'cloudtidy undo {} {}' to revert changes.",
        record.id,
        base.display(),
        record.id
    ));
    Ok(())
}

fn undo(base: &Path, compiled: &CompiledConfig, operation_id: &str) -> Result<(), CliError> {
    let store = history_store(base, compiled)?;
    let mut drive = LocalDrive::new(base)?;
    let report = store.undo(operation_id, &mut drive)?;
    OutputFormatter::undo_report(&report);
    Ok(())
}

fn history(
    base: &Path,
    compiled: &CompiledConfig,
    limit: usize,
    days: Option<u32>,
) -> Result<(), CliError> {
    let store = history_store(base, compiled)?;
    let summaries = match days {
        Some(days) => store.list_within(days, Utc::now())?,
        None => store.list()?,
    };
    let shown = summaries.len().min(limit);
    OutputFormatter::history_table(&summaries[..shown]);
    Ok(())
}

fn suggest(base: &Path, compiled: &CompiledConfig, top: usize) -> Result<(), CliError> {
    let drive = LocalDrive::new(base)?;
    let files = discover(&drive, compiled)?;
    let categorizer = Categorizer::new(&compiled.registry);

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let mut suggestions = categorizer.suggest(&names);
    suggestions.truncate(top);
    OutputFormatter::suggestions(&suggestions);

    let stats = categorizer.category_statistics(&files);
    OutputFormatter::summary_table(&stats, files.len());
    Ok(())
}

fn classify(names: &[String], compiled: &CompiledConfig) {
    let categorizer = Categorizer::new(&compiled.registry);
    let now = Utc::now();
    for name in names {
        let file = FileRecord::new(name.as_str(), name.as_str(), 0, now, now);
        let result = categorizer.classify(&file, &mut NullSink);
        OutputFormatter::classification(name, &result);
    }
}

/// Mover handed to dry runs, which never call it.
struct NoopMover;

impl Mover for NoopMover {
    fn ensure_folder(&mut self, _folder: &str) -> Result<(), MoveError> {
        Ok(())
    }

    fn move_file(&mut self, _source: &str, _destination: &str) -> Result<(), MoveError> {
        Ok(())
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_organize_flags() {
        let cli = Cli::try_parse_from([
            "cloudtidy",
            "-vv",
            "organize",
            "/data",
            "--dry-run",
            "--max-files",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            OrganizeCommand::Organize {
                dir,
                dry_run,
                max_files,
                json,
            } => {
                assert_eq!(dir, PathBuf::from("/data"));
                assert!(dry_run);
                assert_eq!(max_files, Some(10));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cloudtidy",
            "undo",
            "/data",
            "20240101_000000_abcdef",
            "--config",
            "c.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(
            cli.command,
            OrganizeCommand::Undo { ref operation_id, .. } if operation_id == "20240101_000000_abcdef"
        ));
    }

    #[test]
    fn test_parse_history_window() {
        let cli = Cli::try_parse_from(["cloudtidy", "history", "/data", "--days", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            OrganizeCommand::History { limit: 20, days: Some(7), .. }
        ));
    }

    #[test]
    fn test_classify_requires_names() {
        assert!(Cli::try_parse_from(["cloudtidy", "classify"]).is_err());
    }
}
