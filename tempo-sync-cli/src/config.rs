//! `config.json` plus environment overrides.
//!
//! Secrets may live in a `.env` file instead of the JSON file; the env
//! variables below win over whatever the file says.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use unit4::DriverConfig;

use crate::clients::jira::DEFAULT_ACCOUNT_FIELD;
use crate::clients::tempo::DEFAULT_TEMPO_URL;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_MAPPING_FILE: &str = "account_mapping.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}. Copy config.example.json to config.json and fill in your credentials.")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: String,
    pub user_email: String,
    pub api_token: String,
    /// Custom field holding the Tempo account of an issue
    pub account_field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub api_token: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default, alias = "driver")]
    pub unit4: DriverConfig,
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from(DEFAULT_MAPPING_FILE)
}

impl AppConfig {
    /// Read the file, apply env overrides and fill defaults. Credentials are
    /// not checked here; see [`AppConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides();
        config.apply_defaults();
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 5] = [
            ("JIRA_BASE_URL", &mut self.jira.base_url),
            ("JIRA_USER_EMAIL", &mut self.jira.user_email),
            ("JIRA_API_TOKEN", &mut self.jira.api_token),
            ("TEMPO_API_TOKEN", &mut self.tempo.api_token),
            ("UNIT4_URL", &mut self.unit4.url),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                }
            }
        }
    }

    pub fn apply_defaults(&mut self) {
        if self.jira.account_field.is_empty() {
            self.jira.account_field = DEFAULT_ACCOUNT_FIELD.to_string();
        }
        if self.tempo.base_url.is_empty() {
            self.tempo.base_url = DEFAULT_TEMPO_URL.to_string();
        }
        self.jira.base_url = self.jira.base_url.trim_end_matches('/').to_string();
        self.tempo.base_url = self.tempo.base_url.trim_end_matches('/').to_string();
    }

    /// Everything a sync needs before it talks to any service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (self.jira.base_url.as_str(), "jira.base_url"),
            (self.jira.user_email.as_str(), "jira.user_email"),
            (self.jira.api_token.as_str(), "jira.api_token"),
            (self.tempo.api_token.as_str(), "tempo.api_token"),
            (self.unit4.url.as_str(), "unit4.url"),
        ];
        match required.iter().find(|(value, _)| value.trim().is_empty()) {
            Some((_, name)) => Err(ConfigError::Missing(name)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "jira": {
            "base_url": "https://example.atlassian.net/",
            "user_email": "someone@example.com",
            "api_token": "jira-token"
        },
        "tempo": { "api_token": "tempo-token" },
        "unit4": { "url": "https://erp.example.com/", "headless": true },
        "mapping_file": "mapping.json"
    }"#;

    #[test]
    fn test_load_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.jira.base_url, "https://example.atlassian.net");
        assert_eq!(config.jira.account_field, DEFAULT_ACCOUNT_FIELD);
        assert_eq!(config.tempo.base_url, DEFAULT_TEMPO_URL);
        assert!(config.unit4.headless);
        assert_eq!(config.unit4.activity_tag, "TEMPO");
        assert_eq!(config.mapping_file, PathBuf::from("mapping.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_driver_section_alias() {
        let config =
            AppConfig::from_json(r#"{"driver": {"url": "https://erp.example.com"}}"#).unwrap();
        assert_eq!(config.unit4.url, "https://erp.example.com");
        assert_eq!(config.mapping_file, PathBuf::from(DEFAULT_MAPPING_FILE));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_names_missing_field() {
        let mut config = AppConfig::from_json(SAMPLE).unwrap();
        config.tempo.api_token.clear();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing configuration value: tempo.api_token");
    }
}
