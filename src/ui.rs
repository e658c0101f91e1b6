use colored::Colorize;
use declarative::{ApplyResult, DriftOutcome, Kind, ReportSink, RunReport};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

// ============================================================================
// Result Lines
// ============================================================================

/// Plain description of a drift outcome
pub fn drift_label(drift: &DriftOutcome) -> String {
    match drift {
        DriftOutcome::InSync => "in sync".to_string(),
        DriftOutcome::Drifted => "drifted".to_string(),
        DriftOutcome::Unknown { error } => format!("unknown ({error})"),
    }
}

/// Plain description of a convergence result
pub fn apply_label(result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => "no change".to_string(),
        ApplyResult::Created => "created".to_string(),
        ApplyResult::Modified => "modified".to_string(),
        ApplyResult::Started => "started".to_string(),
        ApplyResult::Stopped => "stopped".to_string(),
        ApplyResult::Restarted => "restarted".to_string(),
        ApplyResult::Failed { error } => format!("failed: {error}"),
        ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
    }
}

fn drift_symbol(drift: &DriftOutcome) -> colored::ColoredString {
    match drift {
        DriftOutcome::InSync => "○".dimmed(),
        DriftOutcome::Drifted => "~".yellow(),
        DriftOutcome::Unknown { .. } => "✗".red(),
    }
}

fn apply_symbol(result: &ApplyResult) -> colored::ColoredString {
    match result {
        ApplyResult::NoChange => "○".dimmed(),
        ApplyResult::Failed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
        _ => "✓".green(),
    }
}

/// Prints one line per resource as a pass progresses
///
/// Check passes print the drift of every resource, apply passes print the
/// result of converging it. Quiet mode hides resources that needed nothing.
pub struct TerminalReport {
    quiet: bool,
    check_only: bool,
}

impl TerminalReport {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            check_only: true,
        }
    }
}

impl ReportSink for TerminalReport {
    fn on_run_start(&mut self, count: usize, check_only: bool) {
        self.check_only = check_only;
        if !self.quiet {
            let verb = if check_only { "Checking" } else { "Applying" };
            header(&format!("{verb} {count} resources"));
        }
    }

    fn on_drift(&mut self, name: &str, kind: Kind, drift: &DriftOutcome) {
        if !self.check_only || (self.quiet && *drift == DriftOutcome::InSync) {
            return;
        }
        println!(
            "  {} {} {} {}",
            drift_symbol(drift),
            name,
            format!("[{kind}]").dimmed(),
            drift_label(drift)
        );
    }

    fn on_converged(&mut self, name: &str, result: &ApplyResult) {
        if self.quiet && *result == ApplyResult::NoChange {
            return;
        }
        let label = apply_label(result);
        let label = match result {
            ApplyResult::Failed { .. } => label.red(),
            ApplyResult::NoChange | ApplyResult::Skipped { .. } => label.dimmed(),
            _ => label.normal(),
        };
        println!("  {} {} {}", apply_symbol(result), name, label);
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        print_summary(report);
    }
}

/// Print final summary
pub fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    println!();

    if report.check_only {
        if summary.drifted == 0 && summary.unknown == 0 {
            println!("  {} All {} resources in sync", "✓".green().bold(), summary.total());
        } else {
            println!(
                "  {} {} in sync, {} drifted",
                "~".yellow().bold(),
                summary.in_sync,
                summary.drifted
            );
        }
    } else if summary.is_success() {
        println!("  {} Declaration applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Declaration applied with errors", "⚠".yellow().bold());
    }

    if !report.check_only && summary.changed > 0 {
        println!("    • {} resources changed", summary.changed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.unknown > 0 {
        println!("    • {} {} could not be checked", summary.unknown, "resources".red());
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
