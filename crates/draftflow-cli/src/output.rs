//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use draftflow_core::WorkflowStatus;
use draftflow_host::StatusState;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
///
/// Use for results that should be available for piping, like commit SHAs.
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Format a review request reference, coloured by the draft's status.
#[must_use]
pub fn review_ref(number: u64, status: WorkflowStatus) -> String {
    let text = format!("#{number}");

    match status {
        WorkflowStatus::Draft => text.dimmed().to_string(),
        WorkflowStatus::PendingReview => text.yellow().to_string(),
        WorkflowStatus::PendingPublish => text.green().to_string(),
        WorkflowStatus::Published => text.blue().to_string(),
    }
}

/// Human-readable label for a workflow status.
#[must_use]
pub fn status_label(status: WorkflowStatus) -> String {
    let label = match status {
        WorkflowStatus::Draft => "draft",
        WorkflowStatus::PendingReview => "in review",
        WorkflowStatus::PendingPublish => "ready",
        WorkflowStatus::Published => "published",
    };
    format!("[{label}]")
}

/// Coloured label for a commit status check.
#[must_use]
pub fn check_label(state: StatusState) -> String {
    match state {
        StatusState::Pending => "pending".yellow().to_string(),
        StatusState::Success => "success".green().to_string(),
        StatusState::Failure => "failure".red().to_string(),
        StatusState::Error => "error".red().to_string(),
    }
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}
