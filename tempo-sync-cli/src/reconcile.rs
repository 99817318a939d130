//! Delete-then-recreate reconciliation of one week.
//!
//! Every row this tool ever wrote carries a `[ID:<worklog>]` marker. A run
//! deletes all marked rows of the week and creates one row per mapped
//! worklog, so rows of deleted or edited worklogs disappear as well.
//! Unmarked rows belong to the user and are never touched.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{info, instrument, warn};
use unit4::{Operator, Period, ReadinessState, RemoteEntry, Timesheet};

use crate::clients::{IssueLookup, WorklogSource};
use crate::mapping::{CostCodeMapping, MappingStore};
use crate::prompt::{ask_cost_code, CostCodeAnswer};
use crate::report;
use crate::worklog::{enrich, RemoteWorklog};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub period: Period,
    /// Without it nothing in Unit4 is changed
    pub execute: bool,
    /// Worklogs before this date are left alone
    pub cutover: Option<NaiveDate>,
    /// Open Unit4 during a dry run to list the rows that would be deleted
    pub scan: bool,
    /// Wait before the second attempt at selecting the period
    pub stabilise_delay: Duration,
}

impl SyncOptions {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            execute: false,
            cutover: None,
            scan: false,
            stabilise_delay: Duration::from_secs(5),
        }
    }

    pub fn dry_run(&self) -> bool {
        !self.execute
    }

    /// The period's days, starting no earlier than the cutover. `None` when
    /// the cutover lies after the period.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (start, end) = self.period.date_range();
        let from = self.cutover.map_or(start, |cutover| cutover.max(start));
        (from <= end).then_some((from, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Worklogs are resolved; Unit4 not touched yet
    Planned,
    NothingToSync,
    /// The period cannot be edited; carries the status caption
    Locked(String),
    /// The operator refused the deletion; nothing was created
    DeletionDeclined,
    /// Some marked rows survived the deletion; nothing was created
    DeletionIncomplete { remaining: usize },
    Completed,
}

/// State of one run, kept in memory only.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub period: Period,
    pub dry_run: bool,
    pub scan: bool,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub valid: Vec<RemoteWorklog>,
    /// Worklogs left without a cost-code; not synced
    pub unmapped: Vec<RemoteWorklog>,
    pub existing: Vec<RemoteEntry>,
    pub readiness: Option<ReadinessState>,
    pub deleted: usize,
    pub created: usize,
    pub failures: Vec<RemoteWorklog>,
    pub saved: Option<bool>,
    pub outcome: SyncOutcome,
}

impl SyncRun {
    fn new(options: &SyncOptions) -> Self {
        Self {
            period: options.period,
            dry_run: options.dry_run(),
            scan: options.scan,
            date_range: options.date_range(),
            valid: Vec::new(),
            unmapped: Vec::new(),
            existing: Vec::new(),
            readiness: None,
            deleted: 0,
            created: 0,
            failures: Vec::new(),
            saved: None,
            outcome: SyncOutcome::Planned,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn skipped(&self) -> usize {
        self.unmapped.len()
    }

    pub fn total_hours(&self) -> f64 {
        self.valid.iter().map(|w| w.hours).sum()
    }

    /// Whether [`apply`] has anything to do in the browser.
    pub fn needs_browser(&self) -> bool {
        self.outcome == SyncOutcome::Planned && !self.valid.is_empty() && (!self.dry_run || self.scan)
    }
}

/// Fetch, enrich and map worklogs; ask the operator about unmapped accounts.
#[instrument(skip_all, fields(period = %options.period, execute = options.execute))]
pub async fn prepare(
    options: &SyncOptions,
    source: &dyn WorklogSource,
    issues: &dyn IssueLookup,
    mapping: &mut MappingStore,
    operator: &dyn Operator,
) -> Result<SyncRun> {
    let mut run = SyncRun::new(options);
    let Some((from, to)) = run.date_range else {
        warn!(cutover = ?options.cutover, "Cutover lies after the period");
        run.outcome = SyncOutcome::NothingToSync;
        return Ok(run);
    };

    report::step("1", &format!("Fetching Tempo worklogs ({from} to {to})..."));
    let account_id = source.current_user_account_id().await?;
    let raw = source.fetch_worklogs_for_user(&account_id, from, to).await?;
    report::detail(&format!("Found {} worklogs", raw.len()));

    report::step("2", "Processing worklogs (Jira lookup + mapping)...");
    let enriched = enrich(&raw, issues, mapping).await?;
    run.valid = enriched.valid;
    report::detail(&format!(
        "Valid: {}, Unmapped: {}",
        run.valid.len(),
        enriched.unmapped.len()
    ));

    resolve_unmapped(&mut run, enriched.unmapped, mapping, operator).await;
    run.valid
        .sort_by(|a, b| (a.date, &a.issue_key, a.worklog_id).cmp(&(b.date, &b.issue_key, b.worklog_id)));

    if run.valid.is_empty() {
        run.outcome = SyncOutcome::NothingToSync;
    }
    Ok(run)
}

/// Prompt once per unknown account; later worklogs of the same account reuse
/// the answer.
async fn resolve_unmapped(
    run: &mut SyncRun,
    unmapped: Vec<RemoteWorklog>,
    mapping: &mut MappingStore,
    operator: &dyn Operator,
) {
    if unmapped.is_empty() {
        return;
    }
    report::warning("Found unmapped worklogs. Enter a cost-code or SKIP:");

    for mut worklog in unmapped {
        let Some(account_key) = worklog.account_key.clone() else {
            warn!(worklog_id = worklog.worklog_id, issue = %worklog.issue_key, "Issue has no Tempo account");
            run.unmapped.push(worklog);
            continue;
        };

        if let Some(cost_code) = mapping.cost_code_for(&account_key) {
            worklog.cost_code = Some(cost_code.to_string());
            run.valid.push(worklog);
            continue;
        }

        match ask_cost_code(operator, &worklog).await {
            CostCodeAnswer::CostCode(cost_code) => {
                mapping.upsert(
                    &account_key,
                    CostCodeMapping {
                        cost_code: cost_code.clone(),
                        display_name: worklog.account_name.clone().unwrap_or_else(|| "?".to_string()),
                        sample_ticket: worklog.issue_key.clone(),
                    },
                );
                match mapping.save() {
                    Ok(()) => report::detail(&format!("Saved mapping: {account_key} -> {cost_code}")),
                    Err(e) => warn!("Mapping kept for this run only: {}", e),
                }
                worklog.cost_code = Some(cost_code);
                run.valid.push(worklog);
            }
            CostCodeAnswer::Skip => run.unmapped.push(worklog),
        }
    }
}

/// Bring the Unit4 week in line with `run.valid`.
///
/// A locked period stops the run before anything is deleted. Marked rows
/// that survive the deletion stop it before anything is created, so a row is
/// never duplicated. In a dry run only the scan happens.
#[instrument(skip_all, fields(period = %run.period, dry_run = run.dry_run))]
pub async fn apply(
    run: &mut SyncRun,
    timesheet: &dyn Timesheet,
    operator: &dyn Operator,
    options: &SyncOptions,
) -> Result<()> {
    if !run.needs_browser() {
        return Ok(());
    }

    report::step("4", "Connecting to Unit4...");
    timesheet
        .connect()
        .await
        .context("Failed to open the Unit4 timesheet")?;

    if !timesheet.set_period(run.period).await {
        report::warning("Failed to set the period, waiting for the page to stabilise...");
        tokio::time::sleep(options.stabilise_delay).await;
        if !timesheet.set_period(run.period).await {
            warn!(period = %run.period, "Period still not confirmed, continuing");
        }
    }

    let readiness = timesheet.await_readiness().await;
    run.readiness = Some(readiness.clone());
    match readiness {
        ReadinessState::Locked(status) => {
            report::error(&format!(
                "Cannot sync - period {} is {status} and cannot be edited.",
                run.period
            ));
            run.outcome = SyncOutcome::Locked(status);
            return Ok(());
        }
        ReadinessState::TimedOut | ReadinessState::Unknown => {
            report::warning("Could not confirm the period is editable, proceeding anyway");
        }
        ReadinessState::Editable => {}
    }

    report::step("5", "Scanning existing entries for [ID:...] markers...");
    run.existing = timesheet.extract_marked().await;
    report::detail(&format!("Found {} synced entries", run.existing.len()));
    for entry in run.existing.iter().filter(|e| e.is_malformed()) {
        warn!(worklog_id = entry.worklog_id, text = %entry.text, "Marked row without ticket or cost-code");
    }

    if run.dry_run {
        return Ok(());
    }

    if !run.existing.is_empty() {
        report::step("6", "Deleting all existing [ID:] entries...");
        let deletion = timesheet.delete_all(&run.existing).await;
        run.deleted = deletion.deleted;
        if deletion.declined {
            report::error("Deletion declined. Nothing was created and the week was not saved.");
            run.outcome = SyncOutcome::DeletionDeclined;
            return Ok(());
        }
        if !deletion.is_complete() {
            report::error(&format!(
                "{} marked entries could not be deleted. Nothing was created and the week was not saved.",
                deletion.remaining()
            ));
            run.outcome = SyncOutcome::DeletionIncomplete {
                remaining: deletion.remaining(),
            };
            return Ok(());
        }
    }

    report::step("7", "Creating new entries...");
    for worklog in &run.valid {
        let Some(entry) = worklog.to_new_entry() else {
            run.failures.push(worklog.clone());
            continue;
        };
        if timesheet.create(&entry).await {
            run.created += 1;
            info!(worklog_id = worklog.worklog_id, "Created entry");
        } else {
            warn!(worklog_id = worklog.worklog_id, issue = %worklog.issue_key, "Failed to create entry");
            run.failures.push(worklog.clone());
        }
    }

    timesheet.close_dialogs().await;

    report::step("8", "Saving...");
    let saved = timesheet.save().await;
    if !saved {
        operator
            .pause("Saving failed. Click Save in Unit4 manually, then press ENTER")
            .await;
    }
    run.saved = Some(saved);
    run.outcome = SyncOutcome::Completed;
    Ok(())
}

/// [`prepare`] and [`apply`] against an already opened timesheet.
pub async fn run_sync(
    options: &SyncOptions,
    source: &dyn WorklogSource,
    issues: &dyn IssueLookup,
    mapping: &mut MappingStore,
    operator: &dyn Operator,
    timesheet: &dyn Timesheet,
) -> Result<SyncRun> {
    let mut run = prepare(options, source, issues, mapping, operator).await?;
    apply(&mut run, timesheet, operator, options).await?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cutover_clamps_start() {
        let mut options = SyncOptions::new(Period::new(2026, 5).unwrap());
        assert_eq!(options.date_range(), Some((date(2026, 1, 26), date(2026, 2, 1))));

        options.cutover = Some(date(2026, 1, 29));
        assert_eq!(options.date_range(), Some((date(2026, 1, 29), date(2026, 2, 1))));

        options.cutover = Some(date(2025, 12, 1));
        assert_eq!(options.date_range(), Some((date(2026, 1, 26), date(2026, 2, 1))));

        options.cutover = Some(date(2026, 2, 2));
        assert_eq!(options.date_range(), None);
    }
}
