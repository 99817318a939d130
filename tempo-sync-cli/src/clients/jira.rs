use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::error::{ApiError, Service};
use super::IssueLookup;
use crate::config::JiraConfig;

pub const DEFAULT_ACCOUNT_FIELD: &str = "customfield_10048";

const SUMMARY_LIMIT: usize = 100;

/// The Tempo account attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub key: String,
    pub name: String,
}

impl AccountRef {
    /// Read the account custom field. Tempo has used both `key`/`name` and
    /// `id`/`value` shapes for it over time.
    pub fn from_field(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let key = ["key", "id"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(scalar_to_string)?;
        let name = ["name", "value"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(scalar_to_string)
            .unwrap_or_default();
        Some(Self { key, name })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub key: String,
    pub summary: String,
    pub account: Option<AccountRef>,
}

#[derive(Debug, Deserialize)]
struct Myself {
    #[serde(rename = "accountId")]
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    id: Option<String>,
    key: Option<String>,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    base_url: String,
    email: String,
    token: String,
    account_field: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::from_transport(Service::Jira, &config.base_url, e))?;
        let account_field = if config.account_field.is_empty() {
            DEFAULT_ACCOUNT_FIELD.to_string()
        } else {
            config.account_field.clone()
        };
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.user_email.clone(),
            token: config.api_token.clone(),
            account_field,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ApiError> {
        self.http
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(Service::Jira, &self.base_url, e))
    }

    /// Account id of the user owning the API token.
    #[instrument(skip(self))]
    pub async fn my_account_id(&self) -> Result<String, ApiError> {
        let url = format!("{}/rest/api/3/myself", self.base_url);
        let response = self.get(&url, &[]).await?;
        if !response.status().is_success() {
            return Err(ApiError::from_status(Service::Jira, response.status()));
        }
        let me: Myself = response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(Service::Jira, &url, e))?;
        Ok(me.account_id)
    }
}

#[async_trait::async_trait]
impl IssueLookup for JiraClient {
    #[instrument(skip(self))]
    async fn issue_details(&self, issue_id: u64) -> Result<Option<IssueDetails>, ApiError> {
        let url = format!("{}/rest/api/3/issue/{issue_id}", self.base_url);
        let fields = format!("key,summary,{}", self.account_field);
        let response = self.get(&url, &[("fields", fields.as_str())]).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(issue_id, "Issue not found");
                return Ok(None);
            }
            status if !status.is_success() => {
                return Err(ApiError::from_status(Service::Jira, status));
            }
            _ => {}
        }

        let issue: IssueResponse = response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(Service::Jira, &url, e))?;
        let key = issue
            .key
            .or(issue.id)
            .unwrap_or_else(|| format!("ID:{issue_id}"));
        let summary = issue
            .fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .chars()
            .take(SUMMARY_LIMIT)
            .collect();
        let account = issue
            .fields
            .get(&self.account_field)
            .and_then(AccountRef::from_field);

        Ok(Some(IssueDetails {
            key,
            summary,
            account,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_from_key_and_name() {
        let account = AccountRef::from_field(&json!({"key": "ACC-7", "name": "Platform"})).unwrap();
        assert_eq!(account.key, "ACC-7");
        assert_eq!(account.name, "Platform");
    }

    #[test]
    fn test_account_from_numeric_id_and_value() {
        let account = AccountRef::from_field(&json!({"id": 42, "value": "Support"})).unwrap();
        assert_eq!(account.key, "42");
        assert_eq!(account.name, "Support");
    }

    #[test]
    fn test_account_missing_or_wrong_shape() {
        assert_eq!(AccountRef::from_field(&Value::Null), None);
        assert_eq!(AccountRef::from_field(&json!("ACC-1")), None);
        assert_eq!(AccountRef::from_field(&json!({"name": "No key"})), None);
    }
}
