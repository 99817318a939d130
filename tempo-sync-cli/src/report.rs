//! Operator-facing console output.

use colored::*;

use crate::check::{all_ok, CheckItem, CheckStatus};
use crate::reconcile::{SyncOptions, SyncOutcome, SyncRun};

const RULE: &str = "==================================================";

pub fn header(options: &SyncOptions) {
    let mode = if options.execute {
        "EXECUTE".red().bold()
    } else {
        "DRY-RUN".green().bold()
    };
    println!();
    println!("{RULE}");
    println!("SYNC TEMPO -> UNIT4 | Week {} | Mode: {mode}", options.period);
    println!("{RULE}");
    if let Some(cutover) = options.cutover {
        println!("[*] Cutover: starting from {cutover}");
    }
}

pub fn step(number: &str, message: &str) {
    println!();
    println!("{} {message}", format!("[{number}]").cyan().bold());
}

pub fn detail(message: &str) {
    println!("    {message}");
}

pub fn warning(message: &str) {
    println!("{} {message}", "[!]".yellow().bold());
}

pub fn error(message: &str) {
    println!("{} {message}", "[!]".red().bold());
}

/// Worklogs about to be written, in date order.
pub fn plan(run: &SyncRun) {
    step("3", "Worklogs to sync:");
    for wl in &run.valid {
        println!(
            "    {} | {:5.2}h | {:<15} | {} [ID:{}]",
            wl.date,
            wl.hours,
            wl.issue_key,
            wl.cost_code.as_deref().unwrap_or("-"),
            wl.worklog_id
        );
    }
    println!("    {}", "-".repeat(60));
    println!(
        "    Total: {:.2}h across {} entries",
        run.total_hours(),
        run.valid.len()
    );
}

pub fn dry_run(run: &SyncRun) {
    println!();
    for line in dry_run_lines(run) {
        println!("{line}");
    }
}

/// What an `--execute` run would change, one console line each.
pub fn dry_run_lines(run: &SyncRun) -> Vec<String> {
    let tag = "[DRY-RUN]".green().bold();
    let mut lines = Vec::new();
    if !run.existing.is_empty() {
        lines.push(format!(
            "{tag} Would DELETE {} existing [ID:] entries:",
            run.existing.len()
        ));
        for entry in &run.existing {
            lines.push(format!("    - {} [ID:{}]", entry.ticket_key, entry.worklog_id));
        }
        lines.push(String::new());
    } else if !run.scan {
        lines.push(format!(
            "{tag} Existing entries not scanned; use --scan to list them"
        ));
    }
    lines.push(format!("{tag} Would CREATE {} entries:", run.valid.len()));
    for wl in &run.valid {
        lines.push(format!(
            "    - {} | {}h | {} [ID:{}]",
            wl.issue_key, wl.hours, wl.date, wl.worklog_id
        ));
    }
    lines.push(String::new());
    lines.push("Run with --execute to apply changes.".to_string());
    lines
}

pub fn summary(run: &SyncRun) {
    println!();
    println!("{RULE}");
    println!("{}", "SUMMARY".bold());
    println!("{RULE}");
    match &run.outcome {
        SyncOutcome::Locked(status) => {
            println!("  {} period is {status}, nothing changed", "Locked:".red().bold());
        }
        SyncOutcome::NothingToSync => println!("  No worklogs to sync."),
        SyncOutcome::DeletionDeclined => {
            println!(
                "  {} {} marked entries kept, nothing created",
                "Declined:".yellow().bold(),
                run.existing.len()
            );
        }
        SyncOutcome::DeletionIncomplete { remaining } => {
            println!("  Deleted:  {} entries", run.deleted);
            println!(
                "  {} {remaining} marked entries still present, nothing created or saved",
                "Incomplete:".red().bold()
            );
        }
        _ if run.dry_run => {
            println!("  Mode:     DRY-RUN (no changes made)");
            println!("  Would delete: {} entries", run.existing.len());
            println!("  Would create: {} entries", run.valid.len());
        }
        _ => {
            println!("  Deleted:  {} entries", run.deleted);
            println!("  Created:  {} entries", run.created.to_string().green());
            if run.failed() > 0 {
                println!("  Failed:   {} entries", run.failed().to_string().red());
                for wl in &run.failures {
                    println!("    - {} | {}h | {}", wl.issue_key, wl.hours, wl.date);
                }
            }
            if run.saved == Some(false) {
                println!("  {}", "Saved manually by the operator".yellow());
            }
        }
    }
    println!("  Skipped:  {} worklogs (no mapping)", run.skipped());

    if run.skipped() > 0 {
        println!();
        warning("Some worklogs were SKIPPED (not synced to Unit4)!");
        println!("    Their Tempo accounts have no Unit4 cost-code mapping. To sync them,");
        println!("    run again and enter the cost-code when prompted, or edit the");
        println!("    mapping file by hand.");
    }
}

pub fn check_results(items: &[CheckItem]) {
    println!();
    println!("{RULE}");
    println!("CONNECTIVITY CHECK");
    println!("{RULE}");
    println!();
    for (i, item) in items.iter().enumerate() {
        let status = match &item.status {
            CheckStatus::Ok(msg) => format!("{} {msg}", "OK".green().bold()),
            CheckStatus::Warning(msg) => format!("{} {msg}", "WARNING".yellow().bold()),
            CheckStatus::Failed(msg) => format!("{}\n    {msg}", "FAILED".red().bold()),
        };
        println!("[{}] {}... {status}", i + 1, item.name);
    }
    println!();
    println!("{RULE}");
    if all_ok(items) {
        println!("{}", "All connectivity checks passed!".green());
    } else {
        println!(
            "{}",
            "Some checks FAILED. Fix the issues above before syncing.".red()
        );
    }
    println!("{RULE}");
}
