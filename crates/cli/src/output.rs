//! Human-readable run output

use ripple_core::{ExecutionResult, ItemStatus, RunSummary};

/// One status line for an item that reached a terminal state
pub fn progress_line(result: &ExecutionResult) -> String {
    let status = format!("[{}]", result.status);
    let mut line = format!(
        "{status:<11} {} ({:.2}s)",
        result.name,
        result.duration.as_secs_f64()
    );
    if result.attempts > 1 {
        line.push_str(&format!(" after {} attempts", result.attempts));
    }
    if result.status == ItemStatus::Failed {
        line.push_str(&format!(" rc={}", result.return_code));
    }
    if !result.last_output_line.is_empty() {
        line.push_str("  ");
        line.push_str(&result.last_output_line);
    }
    line
}

/// Closing summary of a run
pub fn summary_text(summary: &RunSummary) -> String {
    let mut text = format!(
        "{}: {} ok, {} cached, {} failed, {} skipped",
        summary.label,
        summary.count(ItemStatus::Succeeded),
        summary.count(ItemStatus::Cached),
        summary.count(ItemStatus::Failed),
        summary.count(ItemStatus::Skipped),
    );
    let cancelled = summary.count(ItemStatus::Cancelled);
    if cancelled > 0 {
        text.push_str(&format!(", {cancelled} cancelled"));
    }
    if summary.aborted {
        text.push_str(" (aborted)");
    }
    let failed = summary.failed_names();
    if !failed.is_empty() {
        text.push_str(&format!("\nfailed: {}", failed.join(", ")));
    }
    text
}

pub fn print_json<T: serde::Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
