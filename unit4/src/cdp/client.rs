use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::errors::AutomationError;

/// HTTP side of the DevTools endpoint: target discovery and availability.
#[derive(Debug, Clone)]
pub struct CdpClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub websocket_url: Option<String>,
}

impl CdpClient {
    pub fn new(debug_port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{debug_port}"))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Check if a browser is running with DevTools enabled
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/json/version", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Get list of all targets
    pub async fn get_tabs(&self) -> Result<Vec<TabInfo>, AutomationError> {
        let response = self
            .client
            .get(format!("{}/json", self.base_url))
            .send()
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to get tabs: {e}")))?;

        let tabs: Vec<TabInfo> = response
            .json()
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to parse tabs: {e}")))?;

        debug!("Found {} open targets", tabs.len());
        Ok(tabs)
    }

    /// First page target that accepts a debugger connection.
    pub async fn page_target(&self) -> Result<TabInfo, AutomationError> {
        self.get_tabs()
            .await?
            .into_iter()
            .find(|t| t.kind == "page" && t.websocket_url.is_some())
            .ok_or_else(|| AutomationError::BrowserError("no debuggable page target".to_string()))
    }

    /// Poll until the endpoint answers or `timeout` elapses.
    pub async fn wait_until_available(&self, timeout: Duration) -> Result<(), AutomationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_available().await {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        Err(AutomationError::Timeout(format!(
            "DevTools endpoint {} did not come up within {:?}",
            self.base_url, timeout
        )))
    }
}

/// A browser this process launched, or one that was already listening.
pub struct BrowserProcess {
    child: Option<Child>,
    // Keeps the throwaway profile alive for as long as the browser runs.
    _profile: Option<tempfile::TempDir>,
    pub client: CdpClient,
}

impl BrowserProcess {
    /// Attach to a browser on the configured port, launching one when nothing answers.
    pub async fn launch_or_attach(config: &DriverConfig) -> Result<Self, AutomationError> {
        let client = CdpClient::new(config.debugging_port);
        if client.is_available().await {
            info!(port = config.debugging_port, "Attaching to running browser");
            return Ok(Self {
                child: None,
                _profile: None,
                client,
            });
        }

        let profile = tempfile::Builder::new()
            .prefix("unit4-profile-")
            .tempdir()
            .map_err(|e| AutomationError::BrowserError(format!("profile dir: {e}")))?;

        let mut command = Command::new(&config.browser_executable);
        command
            .arg(format!("--remote-debugging-port={}", config.debugging_port))
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--start-maximized");
        if config.headless {
            command.arg("--headless=new");
        }
        command
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        info!(
            executable = %config.browser_executable,
            port = config.debugging_port,
            headless = config.headless,
            "Launching browser"
        );
        let child = command.spawn().map_err(|e| {
            AutomationError::BrowserError(format!(
                "failed to launch '{}': {e}",
                config.browser_executable
            ))
        })?;

        client.wait_until_available(config.default_timeout()).await?;
        Ok(Self {
            child: Some(child),
            _profile: Some(profile),
            client,
        })
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop browser: {}", e);
            }
        }
    }
}
