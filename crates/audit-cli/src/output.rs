//! Terminal output formatting.

use colored::{ColoredString, Colorize};

use audit_graph::queries::{ControlCoverage, StandardProjection};
use audit_graph::sync::drift::DriftReport;
use audit_graph::{FailureClass, RunRecord, RunState, StageSummary};

/// Print the counts of one stage, then any failures.
pub fn print_summary(title: &str, summary: &StageSummary) {
    println!("\n{}", format!("{title} complete:").green().bold());

    let rows = [
        ("Nodes upserted", summary.upserted),
        ("Edges created", summary.edges_created),
        ("Nodes deleted", summary.deleted_count()),
        ("Nodes hydrated", summary.hydrated),
        ("Edges repaired", summary.edges_repaired),
        ("Edges removed", summary.edges_removed),
        ("Counters healed", summary.counters_healed),
    ];
    for (label, count) in rows.iter().filter(|(_, count)| *count > 0) {
        println!("  {:<18} {}", format!("{label}:"), count);
    }
    if summary.integrity_alerts > 0 {
        println!(
            "  {:<18} {}",
            "Integrity alerts:",
            summary.integrity_alerts.to_string().red()
        );
    }
    if !summary.irreparable.is_empty() {
        println!(
            "  {:<18} {}",
            "Irreparable:",
            summary.irreparable.len().to_string().yellow()
        );
    }

    if summary.failures.is_empty() {
        return;
    }
    println!("\n{} ({}):", "Failures".red().bold(), summary.failures.len());
    for failure in &summary.failures {
        let kind = failure.kind.map(|k| k.to_string()).unwrap_or_default();
        println!(
            "  {} [{}] {} {}: {}",
            "✗".red(),
            class_colored(failure.class),
            kind,
            failure.id,
            failure.message.dimmed()
        );
    }
}

fn class_colored(class: FailureClass) -> ColoredString {
    match class {
        FailureClass::Transient => "transient".yellow(),
        FailureClass::Data => "data".magenta(),
        FailureClass::Integrity => "integrity".red(),
        FailureClass::Config => "config".red(),
        FailureClass::Cancelled => "cancelled".dimmed(),
    }
}

/// Print a finished run with per-stage timings.
pub fn print_run(record: &RunRecord) {
    let state = match record.state {
        RunState::Running => "running".yellow(),
        RunState::Completed => "completed".green(),
        RunState::Failed => "failed".red(),
    };
    println!(
        "{} {} {}",
        "Run".bold(),
        record.id.to_string().dimmed(),
        state
    );
    if let Some(reason) = &record.reason {
        println!("  {}: {}", "Reason".bold(), reason);
    }

    let Some(report) = &record.report else {
        return;
    };
    for stage in &report.stages {
        println!(
            "  {} {:<14} {}",
            "•".dimmed(),
            stage.stage.to_string(),
            format!("{} ms", stage.duration_ms).dimmed()
        );
    }
    print_summary("Reconciliation", &report.totals);
}

/// Print discrepancies grouped by kind. Empty groups are skipped.
pub fn print_drift(report: &DriftReport) {
    if report.is_clean() {
        println!("{} {}", "✓".green(), "Graph matches the database.".green());
        return;
    }

    println!("{}", "Drift".bold());
    println!("{}", "─".repeat(60));
    for node in &report.nodes {
        let groups = [
            ("missing", &node.missing),
            ("stale", &node.stale),
            ("unhydrated", &node.unhydrated),
        ];
        for (what, ids) in groups.iter().filter(|(_, ids)| !ids.is_empty()) {
            println!(
                "  {:<10} {:<11} {:>5}  {}",
                node.kind.to_string().cyan(),
                what,
                ids.len(),
                preview(ids.iter().map(String::as_str)).dimmed()
            );
        }
    }
    for edge in &report.edges {
        for (what, pairs) in [("missing", &edge.missing), ("excess", &edge.excess)] {
            if pairs.is_empty() {
                continue;
            }
            let shown: Vec<String> = pairs.iter().map(|(a, b)| format!("{a}->{b}")).collect();
            println!(
                "  {} {} {}  {}",
                edge.edge.to_string().yellow(),
                what,
                pairs.len(),
                preview(shown.iter().map(String::as_str)).dimmed()
            );
        }
    }
    for counter in &report.counters {
        println!(
            "  {} {}: stored {} actual {}",
            "counter".magenta(),
            counter.project_control_id,
            counter.stored.to_string().red(),
            counter.actual.to_string().green()
        );
    }
    println!("{}", "─".repeat(60));
    println!("{} discrepancies", report.total().to_string().bold());
}

/// Print per-control coverage as a table.
pub fn print_coverage_table(controls: &[ControlCoverage]) {
    if controls.is_empty() {
        println!("{}", "No controls found.".dimmed());
        return;
    }

    println!("{:<12} {:<32} {:<9} {:>8}", "Code", "Title", "Covered", "Evidence");
    println!("{}", "─".repeat(70));

    for control in controls {
        let covered = if control.covered {
            "yes".green()
        } else if control.eligible {
            "no".red()
        } else {
            "untagged".dimmed()
        };
        println!(
            "{:<12} {:<32} {:<9} {:>8}",
            truncate(control.code.as_deref().unwrap_or(&control.control_id), 11),
            truncate(control.title.as_deref().unwrap_or(""), 30),
            covered,
            control.evidence_in_scope
        );
    }

    let covered = controls.iter().filter(|c| c.covered).count();
    println!(
        "\n{}/{} controls covered",
        covered.to_string().bold(),
        controls.len()
    );
}

/// Print the cross-standard projection.
pub fn print_projection(rows: &[StandardProjection]) {
    if rows.is_empty() {
        println!("{}", "No standards found.".dimmed());
        return;
    }

    for row in rows {
        let pct = format!("{:>3}%", row.percentage);
        let pct = match row.percentage {
            80..=100 => pct.green(),
            40..=79 => pct.yellow(),
            _ => pct.red(),
        };
        println!(
            "  {} {:<30} {:>4}/{:<4}",
            pct,
            truncate(&row.name, 30),
            row.covered,
            row.total
        );
    }
}

fn preview<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let ids: Vec<&str> = ids.collect();
    let mut shown = ids.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    if ids.len() > 5 {
        shown.push_str(&format!(", +{}", ids.len() - 5));
    }
    shown
}

/// Truncate a string to `max` characters, appending an ellipsis when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
