pub mod types;

pub use types::{SyncSummary, TargetOutcome};

use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::design_doc::DesignDocLink;
use crate::sync::{MergedPrDetails, SyncOptions};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write stage output: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to encode stage output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Stage output {0} must be a single line")]
    Multiline(String),
}

/// Sink for `key=value` stage outputs.
///
/// Every output is echoed to stdout; when `GITHUB_OUTPUT` is set it is also
/// appended to that file so later workflow steps can read it.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    path: Option<PathBuf>,
}

impl StageOutput {
    pub fn from_env() -> Self {
        std::env::var_os("GITHUB_OUTPUT").map_or_else(Self::default, Self::to_file)
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Write a plain value, e.g. a branch name or PR number.
    pub fn set(&self, key: &str, value: impl Display) -> Result<(), ReportError> {
        let value = value.to_string();
        if value.contains('\n') {
            return Err(ReportError::Multiline(key.to_string()));
        }
        println!("{}={}", key, value);
        if let Some(path) = &self.path {
            debug!(key, path = %path.display(), "appending stage output");
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}={}", key, value)?;
        }
        Ok(())
    }

    /// Write a value as compact single-line JSON.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ReportError> {
        let json = serde_json::to_string(value)?;
        self.set(key, json)
    }

    /// Outputs of the details stage. The number and base branch are written
    /// even for an unmerged PR so the find-targets stage always has its
    /// inputs.
    pub fn write_details(&self, details: &MergedPrDetails) -> Result<(), ReportError> {
        self.set_json("design_docs", &details.design_docs)?;
        self.set("base_branch", &details.base_branch)?;
        self.set("merged_pr_number", details.merged_pr_number)
    }

    /// Outputs of the update stage: the counts plus per-target results.
    pub fn write_summary(&self, summary: &SyncSummary) -> Result<(), ReportError> {
        self.set("success_count", summary.success_count)?;
        self.set("error_count", summary.error_count)?;
        self.set("skipped_count", summary.skipped_count)?;
        self.set_json("results", &summary.results)
    }
}

/// Print the extracted links to the terminal.
pub fn print_design_docs(links: &[DesignDocLink]) {
    if links.is_empty() {
        println!("{}", "No design docs found.".dimmed());
        return;
    }
    for link in links {
        println!("{}", link);
    }
}

/// Print a sync summary to the terminal with colors.
///
/// ═══ Design doc sync (merge-dedup → ## 設計書一覧) ═══
///   #12  UPDATED
///   #15  FAILED  GitHub API returned 502: Bad Gateway
///
/// Success: 1 | Errors: 1 | Skipped: 0
pub fn print_summary(summary: &SyncSummary, options: &SyncOptions) {
    println!();
    println!(
        "═══ Design doc sync ({} → {}) ═══",
        options.mode,
        options.heading()
    );
    if summary.results.is_empty() {
        println!("  No target PRs processed.");
    }
    for result in &summary.results {
        match &result.outcome {
            TargetOutcome::Failed(message) => {
                println!("  #{:<5} {}  {}", result.number, colorize_outcome(&result.outcome), message)
            }
            outcome => println!("  #{:<5} {}", result.number, colorize_outcome(outcome)),
        }
    }
    println!();
    println!(
        "Success: {} | Errors: {} | Skipped: {}",
        summary.success_count.to_string().green().bold(),
        if summary.has_errors() {
            summary.error_count.to_string().red().bold()
        } else {
            summary.error_count.to_string().normal()
        },
        summary.skipped_count.to_string().yellow()
    );
    println!();
}

fn colorize_outcome(outcome: &TargetOutcome) -> colored::ColoredString {
    match outcome {
        TargetOutcome::Updated => outcome.label().green().bold(),
        TargetOutcome::Unchanged => outcome.label().normal(),
        TargetOutcome::Skipped => outcome.label().yellow().bold(),
        TargetOutcome::Failed(_) => outcome.label().red().bold(),
    }
}
