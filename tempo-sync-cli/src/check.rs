//! `--check`: can every service be reached with the configured credentials?

use chrono::Local;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::clients::{ApiError, JiraClient, Service, TempoClient, WorklogSource};
use crate::config::AppConfig;
use crate::mapping::MappingStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Ok(String),
    Warning(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub status: CheckStatus,
}

impl CheckItem {
    fn new(name: &'static str, status: CheckStatus) -> Self {
        Self { name, status }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed(_))
    }
}

pub async fn check_connectivity(config: &AppConfig) -> Vec<CheckItem> {
    let jira = JiraClient::new(&config.jira);
    let account = match &jira {
        Ok(client) => client.my_account_id().await,
        Err(e) => Err(ApiError::Connect {
            service: Service::Jira,
            url: format!("{} ({e})", config.jira.base_url),
        }),
    };

    let mut items = Vec::with_capacity(4);
    items.push(CheckItem::new(
        "Jira API",
        match &account {
            Ok(id) => CheckStatus::Ok(format!(
                "(account: {}...)",
                id.chars().take(8).collect::<String>()
            )),
            Err(e) => CheckStatus::Failed(e.to_string()),
        },
    ));

    items.push(CheckItem::new(
        "Tempo API",
        match (jira, account) {
            (Ok(jira), Ok(account_id)) => check_tempo(config, jira, &account_id).await,
            _ => CheckStatus::Failed("Tempo: skipped, needs a working Jira login".to_string()),
        },
    ));

    items.push(CheckItem::new("Unit4 URL", check_unit4(&config.unit4.url).await));
    items.push(CheckItem::new("Mapping file", check_mapping(&config.mapping_file)));
    items
}

async fn check_tempo(config: &AppConfig, jira: JiraClient, account_id: &str) -> CheckStatus {
    let today = Local::now().date_naive();
    let result = match TempoClient::new(&config.tempo, jira) {
        Ok(tempo) => tempo.fetch_worklogs_for_user(account_id, today, today).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(_) => CheckStatus::Ok(String::new()),
        Err(e) => CheckStatus::Failed(e.to_string()),
    }
}

/// Any answer from the server counts; redirects to a login page and
/// auth challenges are expected.
async fn check_unit4(url: &str) -> CheckStatus {
    if url.trim().is_empty() {
        return CheckStatus::Failed("unit4.url not configured in config.json".to_string());
    }
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => return CheckStatus::Failed(e.to_string()),
    };
    match client.head(url).send().await {
        Ok(response) => {
            let status = response.status();
            debug!(%status, "Unit4 responded");
            if status.is_success() || matches!(status.as_u16(), 302 | 401 | 403) {
                CheckStatus::Ok(format!("({url})"))
            } else {
                CheckStatus::Warning(format!(
                    "(HTTP {}) URL may be incorrect or server unavailable",
                    status.as_u16()
                ))
            }
        }
        Err(e) => CheckStatus::Failed(ApiError::from_transport(Service::Unit4, url, e).to_string()),
    }
}

fn check_mapping(path: &Path) -> CheckStatus {
    match MappingStore::load(path) {
        Ok(store) if store.is_empty() => CheckStatus::Warning(
            "EMPTY (no mappings yet; you will be prompted during the sync)".to_string(),
        ),
        Ok(store) => CheckStatus::Ok(format!("({} account mappings)", store.len())),
        Err(e) => CheckStatus::Failed(e.to_string()),
    }
}

pub fn all_ok(items: &[CheckItem]) -> bool {
    items.iter().all(|i| !i.is_failed())
}
