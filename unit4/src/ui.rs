//! Small building blocks shared by the driver operations.

use std::time::Duration;
use tracing::{debug, trace};

use crate::engine::{ClickKind, ElementRef, FrameInfo, Scope};
use crate::errors::AutomationError;
use crate::labels::UiLabel;
use crate::selector::Selector;
use crate::session::Unit4Driver;

impl Unit4Driver {
    pub(crate) async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Network idle with the default timeout; a busy page is logged, not fatal.
    pub(crate) async fn wait_idle(&self) {
        if let Err(e) = self
            .engine
            .wait_for_network_idle(self.config.default_timeout())
            .await
        {
            debug!("Network not idle: {}", e);
        }
    }

    pub(crate) async fn content_frame(&self, force_refresh: bool) -> Result<FrameInfo, AutomationError> {
        self.frames.resolve(self.engine.as_ref(), force_refresh).await
    }

    pub(crate) async fn main_frame(&self) -> Option<FrameInfo> {
        self.engine
            .frames()
            .await
            .ok()
            .and_then(|frames| frames.into_iter().find(|f| f.is_main))
    }

    /// First visible element matching `selector`; query errors count as no match.
    pub(crate) async fn first_visible(&self, scope: &Scope, selector: &Selector) -> Option<ElementRef> {
        let found = match self.engine.query(scope, selector).await {
            Ok(found) => found,
            Err(e) => {
                trace!(%selector, "query failed: {}", e);
                return None;
            }
        };
        for el in found {
            if self.engine.is_visible(&el).await.unwrap_or(false) {
                return Some(el);
            }
        }
        None
    }

    /// Whether any caption of `label` is visible as exact text.
    pub(crate) async fn label_visible(&self, frame: &FrameInfo, label: UiLabel) -> Option<String> {
        let scope = Scope::from(frame);
        for caption in self.config.labels.get(label) {
            if self
                .first_visible(&scope, &Selector::text(caption.as_str()))
                .await
                .is_some()
            {
                return Some(caption);
            }
        }
        None
    }

    /// Click a control by caption: exact text first, then buttons, links and
    /// inputs carrying the caption. Falls back to a DOM click when the
    /// pointer click is intercepted.
    pub(crate) async fn click_caption(&self, frame: &FrameInfo, caption: &str) -> bool {
        let scope = Scope::from(frame);
        for selector in [Selector::text(caption), Selector::button(caption)] {
            let Some(el) = self.first_visible(&scope, &selector).await else {
                continue;
            };
            match self.engine.click(&el, ClickKind::Pointer).await {
                Ok(()) => {
                    debug!(caption, "clicked");
                    return true;
                }
                Err(e) => {
                    trace!(caption, "pointer click failed: {}", e);
                    if self.engine.click(&el, ClickKind::Dom).await.is_ok() {
                        debug!(caption, "clicked via DOM");
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Click the first caption of `label` that can be found.
    pub(crate) async fn click_label(&self, frame: &FrameInfo, label: UiLabel) -> bool {
        for caption in self.config.labels.get(label) {
            if self.click_caption(frame, &caption).await {
                return true;
            }
        }
        false
    }
}
