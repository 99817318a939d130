use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;
use crate::patterns::{self, UNKNOWN_TICKET, ZERO_COST_CODE};
use crate::period::Period;
use crate::readiness::ReadinessState;
use crate::session::Unit4Driver;

/// Longest row excerpt kept on an extracted entry.
pub const ENTRY_TEXT_LIMIT: usize = 100;

/// A marked row found in the Unit4 timesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub worklog_id: u64,
    pub ticket_key: String,
    pub cost_code: String,
    pub text: String,
}

impl RemoteEntry {
    /// Build an entry from the text surrounding a marker.
    ///
    /// Rows without a recognisable ticket key or cost-code still become
    /// entries carrying the sentinels, so they are deleted like any other.
    pub fn from_context(worklog_id: u64, context: &str) -> Self {
        Self {
            worklog_id,
            ticket_key: patterns::find_ticket_key(context)
                .unwrap_or(UNKNOWN_TICKET)
                .to_string(),
            cost_code: patterns::find_cost_code(context)
                .unwrap_or(ZERO_COST_CODE)
                .to_string(),
            text: context.trim().chars().take(ENTRY_TEXT_LIMIT).collect(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.ticket_key == UNKNOWN_TICKET || self.cost_code == ZERO_COST_CODE
    }

    pub fn marker(&self) -> String {
        patterns::marker_for(self.worklog_id)
    }
}

/// A row to be created for one worklog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub worklog_id: u64,
    pub ticket_key: String,
    pub cost_code: String,
    /// Free text written after the marker; truncated when written
    pub text: String,
    pub hours: f64,
    pub date: NaiveDate,
}

impl NewEntry {
    pub fn description(&self) -> String {
        patterns::marked_description(self.worklog_id, &self.text)
    }
}

/// Outcome of deleting a set of marked rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub requested: usize,
    /// Rows a re-scan no longer finds
    pub deleted: usize,
    /// The operator refused to delete; the remaining rows were left alone
    pub declined: bool,
}

impl DeletionReport {
    pub fn remaining(&self) -> usize {
        self.requested.saturating_sub(self.deleted)
    }

    /// Every requested row is gone.
    pub fn is_complete(&self) -> bool {
        !self.declined && self.remaining() == 0
    }
}

/// What the reconciliation needs from a timesheet UI.
///
/// Boolean results follow the UI's own granularity: a `false` is a failed
/// item that the caller counts, not an error that aborts the run.
#[async_trait::async_trait]
pub trait Timesheet: Send + Sync {
    /// Open the timesheet, logging in first if needed.
    async fn connect(&self) -> Result<(), AutomationError>;

    async fn set_period(&self, period: Period) -> bool;

    async fn await_readiness(&self) -> ReadinessState;

    async fn extract_marked(&self) -> Vec<RemoteEntry>;

    /// Delete the rows carrying the given markers.
    async fn delete_all(&self, entries: &[RemoteEntry]) -> DeletionReport;

    async fn create(&self, entry: &NewEntry) -> bool;

    async fn close_dialogs(&self);

    async fn save(&self) -> bool;

    async fn close(&self);
}

#[async_trait::async_trait]
impl Timesheet for Unit4Driver {
    async fn connect(&self) -> Result<(), AutomationError> {
        Unit4Driver::connect(self).await.map(|_| ())
    }

    async fn set_period(&self, period: Period) -> bool {
        Unit4Driver::set_period(self, period).await
    }

    async fn await_readiness(&self) -> ReadinessState {
        Unit4Driver::await_readiness(self).await
    }

    async fn extract_marked(&self) -> Vec<RemoteEntry> {
        Unit4Driver::extract_marked(self).await
    }

    async fn delete_all(&self, entries: &[RemoteEntry]) -> DeletionReport {
        Unit4Driver::delete_all(self, entries).await
    }

    async fn create(&self, entry: &NewEntry) -> bool {
        Unit4Driver::create(self, entry).await
    }

    async fn close_dialogs(&self) {
        Unit4Driver::close_dialogs(self).await
    }

    async fn save(&self) -> bool {
        Unit4Driver::save(self).await
    }

    async fn close(&self) {
        Unit4Driver::close(self).await
    }
}
