use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use unit4::NewEntry;

use crate::clients::{ApiError, IssueDetails, IssueLookup};
use crate::mapping::MappingStore;

/// A worklog as Tempo returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorklog {
    pub tempo_worklog_id: u64,
    #[serde(default)]
    pub issue: Option<IssueRef>,
    pub start_date: NaiveDate,
    pub time_spent_seconds: u64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: u64,
}

/// A worklog joined with its issue and, once known, its cost-code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteWorklog {
    pub worklog_id: u64,
    pub issue_id: Option<u64>,
    pub issue_key: String,
    pub issue_summary: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: String,
    pub cost_code: Option<String>,
    pub account_key: Option<String>,
    pub account_name: Option<String>,
}

/// Seconds to hours, rounded to two decimals.
pub fn hours_from_seconds(seconds: u64) -> f64 {
    (seconds as f64 / 36.0).round() / 100.0
}

impl RemoteWorklog {
    pub fn new(raw: &RawWorklog, issue: Option<&IssueDetails>) -> Self {
        let issue_id = raw.issue.as_ref().map(|i| i.id);
        let (issue_key, issue_summary) = match (issue, issue_id) {
            (Some(details), _) => (details.key.clone(), details.summary.clone()),
            (None, Some(id)) => (format!("ID:{id}"), "?".to_string()),
            (None, None) => ("?".to_string(), "?".to_string()),
        };
        let account = issue.and_then(|d| d.account.as_ref());
        Self {
            worklog_id: raw.tempo_worklog_id,
            issue_id,
            issue_key,
            issue_summary,
            date: raw.start_date,
            hours: hours_from_seconds(raw.time_spent_seconds),
            description: raw.description.clone().unwrap_or_default(),
            cost_code: None,
            account_key: account.map(|a| a.key.clone()),
            account_name: account.map(|a| a.name.clone()).filter(|n| !n.is_empty()),
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.cost_code.is_some()
    }

    /// Description if the worklog has one, the issue summary otherwise.
    pub fn text(&self) -> &str {
        let description = self.description.trim();
        if description.is_empty() {
            self.issue_summary.as_str()
        } else {
            description
        }
    }

    pub fn to_new_entry(&self) -> Option<NewEntry> {
        Some(NewEntry {
            worklog_id: self.worklog_id,
            ticket_key: self.issue_key.clone(),
            cost_code: self.cost_code.clone()?,
            text: self.text().to_string(),
            hours: self.hours,
            date: self.date,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct Enriched {
    pub valid: Vec<RemoteWorklog>,
    pub unmapped: Vec<RemoteWorklog>,
}

/// Join worklogs with their issues and the mapping table.
///
/// Each issue is looked up once per call, however many worklogs share it.
pub async fn enrich(
    raw: &[RawWorklog],
    issues: &dyn IssueLookup,
    mapping: &MappingStore,
) -> Result<Enriched, ApiError> {
    let mut cache: HashMap<u64, Option<IssueDetails>> = HashMap::new();
    let mut out = Enriched::default();

    for wl in raw {
        let details = match wl.issue.as_ref().map(|i| i.id) {
            Some(id) => {
                if !cache.contains_key(&id) {
                    let details = issues.issue_details(id).await?;
                    debug!(issue_id = id, found = details.is_some(), "Looked up issue");
                    cache.insert(id, details);
                }
                cache.get(&id).and_then(Option::as_ref)
            }
            None => None,
        };

        let mut worklog = RemoteWorklog::new(wl, details);
        worklog.cost_code = worklog
            .account_key
            .as_deref()
            .and_then(|key| mapping.cost_code_for(key))
            .map(str::to_string);

        if worklog.is_mapped() {
            out.valid.push(worklog);
        } else {
            out.unmapped.push(worklog);
        }
    }

    info!(
        valid = out.valid.len(),
        unmapped = out.unmapped.len(),
        issues = cache.len(),
        "Enriched worklogs"
    );
    Ok(out)
}
