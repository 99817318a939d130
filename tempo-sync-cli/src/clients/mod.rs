//! REST clients for the services worklogs come from.

pub mod error;
pub mod jira;
pub mod tempo;

use chrono::NaiveDate;

pub use error::{ApiError, Service};
pub use jira::{AccountRef, IssueDetails, JiraClient};
pub use tempo::TempoClient;

use crate::worklog::RawWorklog;

#[async_trait::async_trait]
pub trait WorklogSource: Send + Sync {
    async fn current_user_account_id(&self) -> Result<String, ApiError>;

    /// All worklogs of `account_id` between `from` and `to`, both inclusive.
    async fn fetch_worklogs_for_user(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawWorklog>, ApiError>;
}

#[async_trait::async_trait]
pub trait IssueLookup: Send + Sync {
    /// `Ok(None)` when the issue does not exist or is not visible.
    async fn issue_details(&self, issue_id: u64) -> Result<Option<IssueDetails>, ApiError>;
}
