//! Creating and deleting timesheet rows through the detail dialog.

mod create;
mod delete;
mod hours;

pub use hours::format_hours;

use tracing::{debug, trace};

use crate::engine::{ClickKind, ElementRef, FrameInfo, Key, Scope};
use crate::errors::AutomationError;
use crate::labels::UiLabel;
use crate::selector::Selector;
use crate::session::Unit4Driver;

/// Ordered ways of finding the control that belongs to a field caption.
///
/// Captions appear as `L`, `L*` or `L *` depending on whether the field is
/// mandatory in the current layout, so every variant is tried with every
/// strategy before giving up.
pub struct FieldResolver;

impl FieldResolver {
    pub fn variants(caption: &str) -> Vec<String> {
        let base = caption.trim_end_matches('*').trim_end();
        let mut out = vec![caption.to_string()];
        for v in [base.to_string(), format!("{base}*"), format!("{base} *")] {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }

    pub fn strategies(caption: &str) -> Vec<Selector> {
        Self::variants(caption)
            .into_iter()
            .flat_map(|v| {
                [
                    Selector::Label {
                        text: v.clone(),
                        exact: false,
                    },
                    Selector::Following {
                        anchor: v.clone(),
                        tag: "input".to_string(),
                    },
                    Selector::NearestControl { anchor: v.clone() },
                    Selector::Following {
                        anchor: v,
                        tag: "textarea".to_string(),
                    },
                ]
            })
            .collect()
    }
}

impl Unit4Driver {
    /// Fill the field captioned by `label`; `false` when no strategy worked.
    pub(crate) async fn fill_field(&self, frame: &FrameInfo, label: UiLabel, value: &str) -> bool {
        let scope = Scope::from(frame);
        for caption in self.config.labels.get(label) {
            for selector in FieldResolver::strategies(&caption) {
                let Some(control) = self.first_visible(&scope, &selector).await else {
                    continue;
                };
                match self.type_into(&control, value).await {
                    Ok(()) => {
                        debug!(field = %caption, %selector, "filled");
                        return true;
                    }
                    Err(e) => trace!(field = %caption, %selector, "fill failed: {}", e),
                }
            }
        }
        false
    }

    async fn type_into(&self, control: &ElementRef, value: &str) -> Result<(), AutomationError> {
        self.engine.click(control, ClickKind::Pointer).await?;
        self.sleep(self.config.pause(0.2)).await;
        self.engine.press(Key::SelectAll).await?;
        self.engine.fill(control, value).await?;
        self.engine.press(Key::Tab).await?;
        self.sleep(self.config.pause(0.3)).await;
        Ok(())
    }

    /// Dismiss whatever dialog is open: OK in the first frame that shows
    /// one, otherwise Escape.
    pub async fn close_dialogs(&self) {
        let frames = self.engine.frames().await.unwrap_or_default();
        for frame in &frames {
            if self.click_label(frame, UiLabel::Ok).await {
                debug!(frame = %frame.url, "closed dialog with OK");
                self.sleep(self.config.pause(0.5)).await;
                return;
            }
        }
        if let Err(e) = self.engine.press(Key::Escape).await {
            debug!("Escape failed: {}", e);
        }
        self.sleep(self.config.pause(0.5)).await;
    }

    /// Abort the open detail dialog.
    pub(crate) async fn cancel_dialog(&self, frame: &FrameInfo) {
        if !self.click_label(frame, UiLabel::Cancel).await {
            debug!("no cancel control, pressing Escape");
            if let Err(e) = self.engine.press(Key::Escape).await {
                debug!("Escape failed: {}", e);
            }
        }
        self.sleep(self.config.pause(0.5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_cover_mandatory_markers() {
        assert_eq!(
            FieldResolver::variants("Work order"),
            vec!["Work order", "Work order*", "Work order *"]
        );
        assert_eq!(
            FieldResolver::variants("Period*"),
            vec!["Period*", "Period", "Period *"]
        );
    }

    #[test]
    fn test_strategies_try_label_before_layout() {
        let strategies = FieldResolver::strategies("Text");
        assert_eq!(strategies.len(), 12);
        assert!(matches!(&strategies[0], Selector::Label { text, .. } if text == "Text"));
        assert!(matches!(&strategies[3], Selector::Following { tag, .. } if tag == "textarea"));
        assert!(matches!(&strategies[4], Selector::Label { text, .. } if text == "Text*"));
    }
}
