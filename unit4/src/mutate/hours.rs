use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::engine::{ClickKind, ElementRef, FrameInfo, Key, Scope};
use crate::errors::AutomationError;
use crate::labels::UiLabel;
use crate::patterns::{self, DAY_LABEL_JS};
use crate::selector::Selector;
use crate::session::Unit4Driver;

/// Arrows Unit4 puts in front of collapsible section headers.
const SECTION_ARROWS: &str = "[≫»▸▾]";

/// Hours as typed into the time-details grid: `8`, `1.5`, `0.25`.
pub fn format_hours(hours: f64) -> String {
    let rounded = (hours * 100.0).round() / 100.0;
    format!("{rounded}")
}

impl Unit4Driver {
    /// Enter `hours` for `date` in the time-details grid of the open dialog.
    ///
    /// When every attempt fails the operator is asked to type the value by
    /// hand, and the row is treated as filled afterwards.
    pub(crate) async fn fill_hours(&self, frame: &FrameInfo, hours: f64, date: NaiveDate) -> bool {
        let value = format_hours(hours);
        let attempts = self.config.hours_attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                self.sleep(self.config.pause(1.0)).await;
            }
            if !self.expand_time_details(frame).await {
                debug!(attempt, "time details not expanded yet");
            }
            match self.try_fill_hours(frame, &value, date).await {
                Ok(()) => {
                    info!(%date, hours = %value, "Hours entered");
                    return true;
                }
                Err(e) => debug!(attempt, %date, "hours attempt failed: {}", e),
            }
        }

        warn!(%date, hours = %value, "Could not enter hours automatically");
        self.operator
            .pause(&format!(
                "Enter {value} hours for {date} in the time details manually, then press Enter here."
            ))
            .await;
        true
    }

    async fn day_rows_visible(&self, scope: &Scope) -> bool {
        self.first_visible(scope, &Selector::matches(DAY_LABEL_JS))
            .await
            .is_some()
    }

    /// Open the time-details section unless a day row is already visible.
    async fn expand_time_details(&self, frame: &FrameInfo) -> bool {
        let scope = Scope::from(frame);
        if self.day_rows_visible(&scope).await {
            return true;
        }

        for caption in self.config.labels.get(UiLabel::TimeDetails) {
            let legend = self.legend_with(&scope, &caption).await;
            let headers = [
                Selector::matches(format!("{SECTION_ARROWS}.*{}", regex::escape(&caption))),
                Selector::text(caption.as_str()),
                Selector::has_text(caption.as_str()),
            ];
            let mut candidates = Vec::new();
            candidates.extend(legend);
            for header in &headers {
                candidates.extend(self.first_visible(&scope, header).await);
            }
            for el in candidates {
                if self.engine.click(&el, ClickKind::Pointer).await.is_err() {
                    continue;
                }
                self.wait_idle().await;
                self.sleep(self.config.pause(2.0)).await;
                if self.day_rows_visible(&scope).await {
                    return true;
                }
                self.sleep(self.config.pause(1.0)).await;
                return self.day_rows_visible(&scope).await;
            }
        }
        false
    }

    async fn legend_with(&self, scope: &Scope, caption: &str) -> Option<ElementRef> {
        let legends = Selector::Tags {
            names: vec!["legend".to_string()],
        };
        for el in self.engine.query(scope, &legends).await.unwrap_or_default() {
            let text = self.engine.inner_text(&el).await.unwrap_or_default();
            if text.contains(caption) && self.engine.is_visible(&el).await.unwrap_or(false) {
                return Some(el);
            }
        }
        None
    }

    async fn try_fill_hours(
        &self,
        frame: &FrameInfo,
        value: &str,
        date: NaiveDate,
    ) -> Result<(), AutomationError> {
        let scope = Scope::from(frame);
        let label = self.day_label_for(&scope, date).await?;
        let row = self
            .engine
            .closest_row(&label)
            .await?
            .ok_or_else(|| AutomationError::ElementNotFound(format!("row of {date}")))?;
        let cell = self.last_numeric_cell(&row).await?;

        self.engine.click(&cell, ClickKind::Double).await?;
        self.sleep(self.config.pause(0.8)).await;

        let input = self.active_input(&scope, &cell).await?;
        if let Err(e) = self.engine.fill(&input, value).await {
            debug!("fill failed, assigning value: {}", e);
            self.engine.set_value(&input, value).await?;
        }
        self.engine.press(Key::Tab).await?;
        self.sleep(self.config.pause(0.5)).await;
        Ok(())
    }

    /// The day-row label that resolves to `date`.
    async fn day_label_for(&self, scope: &Scope, date: NaiveDate) -> Result<ElementRef, AutomationError> {
        let mut seen = Vec::new();
        for el in self.engine.query(scope, &Selector::matches(DAY_LABEL_JS)).await? {
            if !self.engine.is_visible(&el).await? {
                continue;
            }
            let text = self.engine.inner_text(&el).await?;
            let resolved = patterns::parse_day_label(&text).and_then(|l| l.resolve(date));
            if resolved == Some(date) {
                return Ok(el);
            }
            seen.push(text);
        }
        Err(AutomationError::ElementNotFound(format!(
            "day row for {date} (visible: {seen:?})"
        )))
    }

    /// Rightmost visible cell holding a bare number: the booked-hours column.
    async fn last_numeric_cell(&self, row: &ElementRef) -> Result<ElementRef, AutomationError> {
        let cells = self.engine.query(&Scope::from(row), &Selector::Cells).await?;
        for cell in cells.into_iter().rev() {
            if !self.engine.is_visible(&cell).await.unwrap_or(false) {
                continue;
            }
            let text = self.engine.inner_text(&cell).await.unwrap_or_default();
            let text = text.trim();
            if !text.is_empty() && patterns::is_numeric_cell(text) {
                return Ok(cell);
            }
        }
        Err(AutomationError::ElementNotFound("numeric hours cell".to_string()))
    }

    /// The input the double click activated: focused input, then an editable
    /// input inside the cell, then any editable numeric input in the frame.
    async fn active_input(&self, scope: &Scope, cell: &ElementRef) -> Result<ElementRef, AutomationError> {
        let candidates = [
            (scope.clone(), Selector::Focused),
            (Scope::from(cell), Selector::EditableInput { data_type: None }),
            (
                scope.clone(),
                Selector::EditableInput {
                    data_type: Some("Double".to_string()),
                },
            ),
        ];
        for (scope, selector) in &candidates {
            if let Some(input) = self.engine.query(scope, selector).await?.into_iter().next() {
                return Ok(input);
            }
        }
        Err(AutomationError::ElementNotFound("active hours input".to_string()))
    }
}
