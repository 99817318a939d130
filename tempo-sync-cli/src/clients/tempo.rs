use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::error::{ApiError, Service};
use super::jira::JiraClient;
use super::WorklogSource;
use crate::config::TempoConfig;
use crate::worklog::RawWorklog;

pub const DEFAULT_TEMPO_URL: &str = "https://api.tempo.io/4";

const PAGE_LIMIT: &str = "1000";

#[derive(Debug, Deserialize)]
struct WorklogPage {
    #[serde(default)]
    results: Vec<RawWorklog>,
    #[serde(default)]
    metadata: PageMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PageMetadata {
    next: Option<String>,
}

/// Tempo REST v4. The user identity comes from Jira, which owns accounts.
#[derive(Debug, Clone)]
pub struct TempoClient {
    http: Client,
    base_url: String,
    token: String,
    jira: JiraClient,
}

impl TempoClient {
    pub fn new(config: &TempoConfig, jira: JiraClient) -> Result<Self, ApiError> {
        let base_url = if config.base_url.is_empty() {
            DEFAULT_TEMPO_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::from_transport(Service::Tempo, &base_url, e))?;
        Ok(Self {
            http,
            base_url,
            token: config.api_token.clone(),
            jira,
        })
    }

    async fn fetch_page(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<WorklogPage, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(Service::Tempo, &self.base_url, e))?;
        if !response.status().is_success() {
            return Err(ApiError::from_status(Service::Tempo, response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(Service::Tempo, url, e))
    }
}

#[async_trait::async_trait]
impl WorklogSource for TempoClient {
    async fn current_user_account_id(&self) -> Result<String, ApiError> {
        self.jira.my_account_id().await
    }

    #[instrument(skip(self))]
    async fn fetch_worklogs_for_user(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawWorklog>, ApiError> {
        let mut worklogs = Vec::new();
        let mut url = format!("{}/worklogs/user/{account_id}", self.base_url);
        // Next-page links already carry the query
        let mut query = vec![
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];

        loop {
            let page = self.fetch_page(&url, &query).await?;
            debug!(count = page.results.len(), "Fetched worklog page");
            worklogs.extend(page.results);
            match page.metadata.next {
                Some(next) if !next.is_empty() => {
                    url = next;
                    query.clear();
                }
                _ => break,
            }
        }

        info!(count = worklogs.len(), %from, %to, "Fetched Tempo worklogs");
        Ok(worklogs)
    }
}
