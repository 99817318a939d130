use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::labels::Labels;
use crate::retry::RetryPolicy;

/// Everything the driver needs to know that is not a caption: browser launch,
/// session persistence, pacing and retry budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Unit4 landing page
    pub url: String,
    /// Browser binary; resolved against PATH when relative
    pub browser_executable: String,
    /// DevTools port; a browser already listening there is reused
    pub debugging_port: u16,
    pub headless: bool,
    /// Where the authenticated session is persisted between runs
    pub session_file: PathBuf,
    /// Fragment of the URL of the frame holding the timesheet form
    pub content_frame_fragment: String,
    pub default_timeout_ms: u64,
    /// Attempts for the week selector and the dialog confirm loop
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    /// Wait after committing a value the UI reloads asynchronously
    pub settle_delay_ms: u64,
    /// Delay applied before every user-visible action
    pub slow_mo_ms: u64,
    /// Per-key delay when typing into the period control
    pub type_delay_ms: u64,
    /// 1 s polls while waiting for the period control after login
    pub navigation_polls: u32,
    /// 1 s polls of the readiness state machine
    pub readiness_polls: u32,
    pub poll_interval_ms: u64,
    pub hours_attempts: u32,
    pub delete_passes: u32,
    /// Polls for the add-row control after confirming a dialog
    pub dialog_close_polls: u32,
    /// Ask the operator before bulk-deleting marked rows
    pub confirm_deletions: bool,
    /// Constant written into the activity field of created rows
    pub activity_tag: String,
    pub labels: Labels,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            browser_executable: "chromium".to_string(),
            debugging_port: 9222,
            headless: false,
            session_file: PathBuf::from("session.json"),
            content_frame_fragment: "ContentContainer".to_string(),
            default_timeout_ms: 10_000,
            retry_count: 3,
            retry_delay_ms: 2_000,
            settle_delay_ms: 3_000,
            slow_mo_ms: 100,
            type_delay_ms: 30,
            navigation_polls: 15,
            readiness_polls: 10,
            poll_interval_ms: 1_000,
            hours_attempts: 5,
            delete_passes: 3,
            dialog_close_polls: 10,
            confirm_deletions: true,
            activity_tag: "TEMPO".to_string(),
            labels: Labels::default(),
        }
    }
}

impl DriverConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn slow_mo(&self) -> Duration {
        Duration::from_millis(self.slow_mo_ms)
    }

    pub fn type_delay(&self) -> Duration {
        Duration::from_millis(self.type_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// A short pause scaled from the poll interval, used between UI steps.
    pub fn pause(&self, fraction: f64) -> Duration {
        self.poll_interval().mul_f64(fraction)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_count, Duration::from_millis(self.retry_delay_ms))
    }

    /// Same budgets with every delay removed; for driving in-memory pages.
    pub fn without_delays(mut self) -> Self {
        self.retry_delay_ms = 0;
        self.settle_delay_ms = 0;
        self.slow_mo_ms = 0;
        self.type_delay_ms = 0;
        self.poll_interval_ms = 0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DriverConfig =
            serde_json::from_str(r#"{"url": "https://erp.example.com", "headless": true}"#)
                .unwrap();
        assert_eq!(config.url, "https://erp.example.com");
        assert!(config.headless);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.session_file, PathBuf::from("session.json"));
    }

    #[test]
    fn test_without_delays() {
        let config = DriverConfig::default().without_delays();
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.pause(0.5), Duration::ZERO);
        assert_eq!(config.retry_count, 3);
    }
}
