//! Output formatting and styling module.
//!
//! All user-facing CLI output goes through [`OutputFormatter`]. Logging goes to
//! stderr through `tracing` and never mixes with these reports.

use crate::file_category::CategorizationResult;
use crate::file_organizer::RecordStatus;
use crate::planner::{BatchReport, MoveOperation};
use crate::undo::{RecordSummary, UndoReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cloudtidy::output::OutputFormatter;
    /// OutputFormatter::success("Organized 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` move operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cloudtidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a category table, one row per category.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = max_category_len
        );
    }

    /// Prints the aggregated batch report of a plan.
    pub fn batch_report(report: &BatchReport) {
        Self::header("PLAN");
        println!("Discovered:          {}", report.total_discovered);
        println!("To move:             {}", report.to_move.to_string().green());
        println!("Skipped:             {}", report.to_skip);
        for (reason, count) in &report.skip_reasons {
            println!("  {:<18} {}", reason, count);
        }
        if report.deferred > 0 {
            println!(
                "Deferred:            {} {}",
                report.deferred.to_string().yellow(),
                "(batch limit reached; run again to continue)".dimmed()
            );
        }
        println!("Folders needed:      {}", report.folders_needed);
        println!("Conflicts resolved:  {}", report.conflicts_resolved);

        if !report.categories.is_empty() {
            Self::summary_table(&report.categories, report.to_move);
        }
    }

    /// Lists the moves a dry run would perform.
    pub fn planned_moves(operations: &[MoveOperation]) {
        Self::header("PLANNED MOVES");
        for op in operations {
            println!(
                " - {} {} {} {}",
                op.source_path,
                "→".cyan(),
                op.destination_path(),
                format!("[{} {:.1}]", op.category, op.score).dimmed()
            );
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    pub fn undo_report(report: &UndoReport) {
        Self::header(&format!("UNDO {}", report.operation_id));
        println!("  Restored: {}", report.restored.to_string().green());

        if !report.skipped.is_empty() {
            println!("  Skipped: {}", report.skipped.len().to_string().yellow());
            for (path, reason) in &report.skipped {
                println!("    - {}: {}", path, reason);
            }
        }

        if !report.failed.is_empty() {
            println!("  Failed: {}", report.failed.len().to_string().red());
            for (path, reason) in &report.failed {
                eprintln!("    - {}: {}", path, reason);
            }
        }

        if report.is_complete_success() {
            Self::success(&format!("Operation {} fully undone", report.operation_id));
        } else {
            Self::warning(&format!(
                "Operation {} partially undone ({} of {} files restored)",
                report.operation_id,
                report.restored,
                report.total_processed()
            ));
        }
    }

    /// Prints recorded runs, newest first.
    pub fn history_table(summaries: &[RecordSummary]) {
        if summaries.is_empty() {
            Self::info("No recorded operations.");
            return;
        }

        Self::header("HISTORY");
        println!(
            "{:<24} {:<20} {:<17} {:>6} {:>6}",
            "Id".bold(),
            "Created".bold(),
            "Status".bold(),
            "Moved".bold(),
            "Failed".bold()
        );
        for summary in summaries {
            let status = summary.status.as_str();
            let status = match summary.status {
                RecordStatus::Complete => status.green(),
                RecordStatus::Partial => status.yellow(),
                _ => status.dimmed(),
            };
            println!(
                "{:<24} {:<20} {:<17} {:>6} {:>6}",
                summary.id,
                summary.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                status,
                summary.files_moved,
                summary.files_failed
            );
        }
    }

    /// Prints one classification decision.
    pub fn classification(name: &str, result: &CategorizationResult) {
        let rules = if result.matched_rules.is_empty() {
            "no rule matched".to_string()
        } else {
            result.matched_rules.join(", ")
        };
        println!(
            "{} {} {} {}",
            name,
            "→".cyan(),
            result.category.bold(),
            format!("(score {:.1}; {})", result.score, rules).dimmed()
        );
    }

    /// Prints keyword suggestions with their frequencies.
    pub fn suggestions(suggestions: &[(String, usize)]) {
        if suggestions.is_empty() {
            Self::info("No new keyword candidates found.");
            return;
        }

        Self::header("KEYWORD SUGGESTIONS");
        for (token, count) in suggestions {
            println!("  {:<24} {}", token, count.to_string().green());
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
