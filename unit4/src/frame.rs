use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::engine::{BrowserEngine, FrameInfo, Scope};
use crate::errors::AutomationError;
use crate::selector::Selector;

/// Finds the frame that holds the timesheet form.
///
/// Unit4 renders its forms inside a nested frame whose URL carries a known
/// fragment. When no frame carries it, the frame that contains the period
/// control wins, and the main frame is the last resort.
pub struct FrameResolver {
    fragment: String,
    period_captions: Vec<String>,
    cached: Mutex<Option<FrameInfo>>,
}

impl FrameResolver {
    pub fn new(fragment: impl Into<String>, period_captions: Vec<String>) -> Self {
        Self {
            fragment: fragment.into(),
            period_captions,
            cached: Mutex::new(None),
        }
    }

    /// Last resolved frame, if any.
    pub async fn cached(&self) -> Option<FrameInfo> {
        self.cached.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Resolve the content frame, reusing the cached one unless `force_refresh`.
    pub async fn resolve(
        &self,
        engine: &dyn BrowserEngine,
        force_refresh: bool,
    ) -> Result<FrameInfo, AutomationError> {
        if !force_refresh {
            if let Some(frame) = self.cached.lock().await.clone() {
                return Ok(frame);
            }
        }

        let frames = engine.frames().await?;
        let main = frames
            .iter()
            .find(|f| f.is_main)
            .or_else(|| frames.first())
            .cloned()
            .ok_or_else(|| AutomationError::BrowserError("page has no frames".to_string()))?;

        let resolved = match frames.iter().find(|f| f.url.contains(&self.fragment)) {
            Some(frame) => {
                trace!(frame = %frame.url, "content frame matched by URL");
                frame.clone()
            }
            None => match self.frame_with_period_control(engine, &frames).await {
                Some(frame) => {
                    trace!(frame = %frame.url, "content frame matched by period control");
                    frame
                }
                None => {
                    debug!("no content frame found, using main frame");
                    main
                }
            },
        };

        *self.cached.lock().await = Some(resolved.clone());
        Ok(resolved)
    }

    async fn frame_with_period_control(
        &self,
        engine: &dyn BrowserEngine,
        frames: &[FrameInfo],
    ) -> Option<FrameInfo> {
        for frame in frames {
            let scope = Scope::from(frame);
            for caption in &self.period_captions {
                match engine.query(&scope, &Selector::label(caption.as_str())).await {
                    Ok(found) if !found.is_empty() => return Some(frame.clone()),
                    Ok(_) => {}
                    Err(e) => trace!(frame = %frame.id, "frame check failed: {}", e),
                }
            }
        }
        None
    }
}
