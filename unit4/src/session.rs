use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cdp::CdpEngine;
use crate::config::DriverConfig;
use crate::engine::{BrowserEngine, ClickKind, FrameInfo, Scope};
use crate::errors::AutomationError;
use crate::frame::FrameResolver;
use crate::labels::UiLabel;
use crate::operator::Operator;
use crate::selector::Selector;

/// Drives the Unit4 timesheet through a [`BrowserEngine`].
///
/// All operations take `&self`; the only mutable state is the frame cache,
/// and callers never run two UI operations at once.
pub struct Unit4Driver {
    pub(crate) engine: Arc<dyn BrowserEngine>,
    pub(crate) config: DriverConfig,
    pub(crate) operator: Arc<dyn Operator>,
    pub(crate) frames: FrameResolver,
    pub(crate) dry_run: bool,
}

impl Unit4Driver {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        config: DriverConfig,
        operator: Arc<dyn Operator>,
    ) -> Self {
        let frames = FrameResolver::new(
            config.content_frame_fragment.clone(),
            config.labels.get(UiLabel::PeriodField),
        );
        Self {
            engine,
            config,
            operator,
            frames,
            dry_run: false,
        }
    }

    /// Launch a browser over the DevTools protocol and wrap it.
    pub async fn launch(
        config: DriverConfig,
        operator: Arc<dyn Operator>,
    ) -> Result<Self, AutomationError> {
        let engine = CdpEngine::launch(&config).await?;
        Ok(Self::new(Arc::new(engine), config, operator))
    }

    /// In dry-run mode creation and deletion report success without touching the UI.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn BrowserEngine {
        self.engine.as_ref()
    }

    /// Restore the session, open Unit4, handle login and open the timesheet.
    ///
    /// Returns the content frame. When the period control never shows up the
    /// last resolved frame is returned anyway and the run continues degraded.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn connect(&self) -> Result<FrameInfo, AutomationError> {
        if self.config.url.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "Unit4 URL is not configured".to_string(),
            ));
        }

        let session_file = &self.config.session_file;
        if session_file.exists() {
            if let Err(e) = self.engine.restore_session(session_file).await {
                warn!("Could not restore session from {}: {}", session_file.display(), e);
            }
        }

        info!("Opening Unit4");
        self.engine.navigate(&self.config.url).await?;
        self.wait_idle().await;
        self.sleep(self.config.settle_delay()).await;

        if self.is_login_page().await {
            info!("Login page detected, waiting for the operator");
            self.operator
                .pause("Log in to Unit4 in the browser window, then press Enter here.")
                .await;
            self.wait_idle().await;
            match self.engine.save_session(session_file).await {
                Ok(()) => info!(path = %session_file.display(), "Session stored"),
                Err(e) => warn!("Could not store session: {}", e),
            }
        }

        if !self.open_timesheet().await {
            self.operator
                .pause("Open the weekly timesheet in the browser, then press Enter here.")
                .await;
        }
        self.wait_idle().await;

        Ok(self.wait_for_period_control().await)
    }

    async fn is_login_page(&self) -> bool {
        let labels = &self.config.labels;
        match self.engine.title().await {
            Ok(title) if labels.mentions(UiLabel::LoginIndicators, &title) => return true,
            Ok(_) => {}
            Err(e) => debug!("Could not read page title: {}", e),
        }

        let frames = match self.engine.frames().await {
            Ok(frames) => frames,
            Err(_) => return false,
        };
        let Some(main) = frames.iter().find(|f| f.is_main) else {
            return false;
        };
        let headings = Selector::Tags {
            names: vec!["h1".to_string(), "h2".to_string()],
        };
        if let Ok(found) = self.engine.query(&Scope::from(main), &headings).await {
            if let Some(first) = found.first() {
                if let Ok(text) = self.engine.inner_text(first).await {
                    return labels.mentions(UiLabel::LoginIndicators, &text);
                }
            }
        }
        false
    }

    /// Click the timesheet menu entry, searching every frame until the timeout.
    async fn open_timesheet(&self) -> bool {
        let captions = self.config.labels.get(UiLabel::TimesheetMenu);
        let deadline = tokio::time::Instant::now() + self.config.default_timeout();
        loop {
            let frames = self.engine.frames().await.unwrap_or_default();
            for frame in &frames {
                let scope = Scope::from(frame);
                for caption in &captions {
                    let Some(entry) = self.first_visible(&scope, &Selector::text(caption.as_str())).await
                    else {
                        continue;
                    };
                    info!(caption = %caption, "Opening timesheet");
                    match self.engine.click(&entry, ClickKind::Pointer).await {
                        Ok(()) => return true,
                        Err(e) => {
                            warn!("Clicking '{}' failed: {}", caption, e);
                            return false;
                        }
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Timesheet menu entry not found");
                return false;
            }
            self.sleep(self.config.pause(0.5)).await;
        }
    }

    async fn wait_for_period_control(&self) -> FrameInfo {
        let mut last = None;
        for poll in 0..self.config.navigation_polls.max(1) {
            match self.frames.resolve(self.engine.as_ref(), true).await {
                Ok(frame) => {
                    if self.find_period_input(&frame).await.is_some() {
                        info!(frame = %frame.url, "Timesheet ready");
                        return frame;
                    }
                    last = Some(frame);
                }
                Err(e) => debug!(poll, "Frame resolution failed: {}", e),
            }
            self.sleep(self.config.poll_interval()).await;
        }
        warn!(
            polls = self.config.navigation_polls,
            "Period control did not appear; continuing with the last resolved frame"
        );
        last.unwrap_or_else(|| FrameInfo {
            id: String::new(),
            url: String::new(),
            is_main: true,
        })
    }

    /// Save pending changes: save button in the content frame, then in the
    /// main frame, then the keyboard shortcut.
    #[instrument(skip(self))]
    pub async fn save(&self) -> bool {
        let mut saved = false;
        if let Ok(frame) = self.content_frame(false).await {
            saved = self.click_label(&frame, UiLabel::Save).await;
        }
        if !saved {
            if let Some(main) = self.main_frame().await {
                saved = self.click_label(&main, UiLabel::Save).await;
            }
        }
        if !saved {
            match self.engine.press(crate::engine::Key::Save).await {
                Ok(()) => saved = true,
                Err(e) => warn!("Save shortcut failed: {}", e),
            }
        }
        if !saved {
            self.operator
                .pause("Saving failed. Save the timesheet manually, then press Enter here.")
                .await;
            return false;
        }

        self.wait_idle().await;
        self.sleep(self.config.pause(2.0)).await;
        if let Ok(frame) = self.content_frame(false).await {
            self.click_label(&frame, UiLabel::Ok).await;
        }
        if let Some(main) = self.main_frame().await {
            self.click_label(&main, UiLabel::Ok).await;
        }
        info!("Timesheet saved");
        true
    }

    pub async fn close(&self) {
        if let Err(e) = self.engine.close().await {
            debug!("Closing browser failed: {}", e);
        }
    }
}
