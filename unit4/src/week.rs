use tracing::{info, instrument, warn};

use crate::engine::{ClickKind, ElementRef, FrameInfo, Key, Scope};
use crate::errors::AutomationError;
use crate::labels::UiLabel;
use crate::period::Period;
use crate::selector::Selector;
use crate::session::Unit4Driver;

/// Fragment of the period control's id and name attributes.
const PERIOD_ATTR_FRAGMENT: &str = "week";

impl Unit4Driver {
    /// Locate the period input: by label, then id, then name.
    pub(crate) async fn find_period_input(&self, frame: &FrameInfo) -> Option<ElementRef> {
        let scope = Scope::from(frame);
        let mut strategies: Vec<Selector> = self
            .config
            .labels
            .get(UiLabel::PeriodField)
            .into_iter()
            .map(Selector::label)
            .collect();
        strategies.push(Selector::IdContains {
            fragment: PERIOD_ATTR_FRAGMENT.to_string(),
        });
        strategies.push(Selector::NameContains {
            fragment: PERIOD_ATTR_FRAGMENT.to_string(),
        });

        for selector in &strategies {
            if let Some(el) = self.first_visible(&scope, selector).await {
                return Some(el);
            }
        }
        None
    }

    /// Switch the timesheet to `period`.
    ///
    /// The whole type-and-commit sequence is retried, re-resolving the frame
    /// on every retry; `false` once all attempts failed or an error was not
    /// worth retrying.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn set_period(&self, period: Period) -> bool {
        let code = period.code();
        let result = self
            .config
            .retry_policy()
            .run_while("set_period", AutomationError::is_retryable, |attempt| {
                let code = code.clone();
                async move {
                    let frame = self.content_frame(attempt.is_retry()).await?;
                    self.enter_period(&frame, &code).await
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!("Period set to {}", code);
                true
            }
            Err(e) => {
                warn!("Could not set period {}: {}", code, e);
                false
            }
        }
    }

    async fn enter_period(&self, frame: &FrameInfo, code: &str) -> Result<(), AutomationError> {
        let input = self
            .find_period_input(frame)
            .await
            .ok_or_else(|| AutomationError::ElementNotFound("period input".to_string()))?;

        // The control sits under an overlay on some layouts; a DOM click gets through.
        if self.engine.click(&input, ClickKind::Pointer).await.is_err() {
            self.engine.click(&input, ClickKind::Dom).await?;
        }
        self.engine.press(Key::SelectAll).await?;
        self.engine.type_text(code, self.config.type_delay()).await?;
        self.engine.press(Key::Tab).await?;
        self.wait_idle().await;
        self.sleep(self.config.settle_delay()).await;
        Ok(())
    }
}
