use tracing::{debug, info, instrument, warn};

use crate::engine::{ClickKind, FrameInfo, Key, Scope};
use crate::labels::UiLabel;
use crate::selector::Selector;
use crate::session::Unit4Driver;
use crate::timesheet::NewEntry;

impl Unit4Driver {
    /// Add one row for `entry` through the detail dialog.
    ///
    /// Fields are filled in a fixed order with the ticket key last, since
    /// entering it triggers a lookup that may rewrite the other fields. Every
    /// exit path leaves the dialog closed.
    #[instrument(skip(self, entry), fields(worklog_id = entry.worklog_id, ticket = %entry.ticket_key, date = %entry.date))]
    pub async fn create(&self, entry: &NewEntry) -> bool {
        if self.dry_run {
            info!(hours = entry.hours, "Dry run: would create entry");
            return true;
        }

        let frame = match self.content_frame(false).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("No content frame: {}", e);
                return false;
            }
        };

        if !self.click_label(&frame, UiLabel::AddRow).await {
            warn!("Add-row control not found");
            return false;
        }
        self.wait_idle().await;
        self.sleep(self.config.pause(1.0)).await;

        if !self.open_details(&frame).await {
            warn!("Detail view could not be opened");
            self.cancel_dialog(&frame).await;
            return false;
        }
        self.wait_idle().await;
        self.sleep(self.config.settle_delay()).await;

        let cost_code_ok = self
            .fill_field(&frame, UiLabel::CostCodeField, &entry.cost_code)
            .await;
        let activity_ok = self
            .fill_field(&frame, UiLabel::ActivityField, &self.config.activity_tag)
            .await;
        let description_ok = self
            .fill_field(&frame, UiLabel::DescriptionField, &entry.description())
            .await;
        let ticket_ok = self
            .fill_field(&frame, UiLabel::TicketField, &entry.ticket_key)
            .await;
        info!(
            cost_code = cost_code_ok,
            activity = activity_ok,
            description = description_ok,
            ticket = ticket_ok,
            "Fields filled"
        );

        if !(cost_code_ok && description_ok) {
            warn!("Mandatory field missing, cancelling");
            self.cancel_dialog(&frame).await;
            return false;
        }

        if !self.fill_hours(&frame, entry.hours, entry.date).await {
            warn!("Hours could not be entered, cancelling");
            self.cancel_dialog(&frame).await;
            return false;
        }

        if !self.click_label(&frame, UiLabel::Ok).await {
            warn!("OK not found, trying Enter");
            if let Err(e) = self.engine.press(Key::Enter).await {
                debug!("Enter failed: {}", e);
            }
            self.sleep(self.config.pause(1.0)).await;
            self.cancel_dialog(&frame).await;
            self.click_label(&frame, UiLabel::Ok).await;
            return false;
        }
        self.wait_idle().await;
        self.sleep(self.config.settle_delay()).await;

        if !self.ensure_dialog_closed(&frame).await {
            warn!("Dialog did not close after OK, entry not confirmed");
            return false;
        }
        info!("Entry created");
        true
    }

    /// Click the first zoom icon, which belongs to the row just added.
    async fn open_details(&self, frame: &FrameInfo) -> bool {
        let scope = Scope::from(frame);
        for caption in self.config.labels.get(UiLabel::MoreDetails) {
            let selector = Selector::AttrEquals {
                name: "title".to_string(),
                value: caption,
            };
            let icons = self.engine.query(&scope, &selector).await.unwrap_or_default();
            if let Some(icon) = icons.first() {
                return self.engine.click(icon, ClickKind::Pointer).await.is_ok();
            }
        }
        false
    }

    /// Poll for the add-row control; while it is hidden a dialog is still
    /// open, so confirm or cancel it again. When polling runs out the dialog
    /// is cancelled and the entry counts as failed.
    async fn ensure_dialog_closed(&self, frame: &FrameInfo) -> bool {
        let polls = self.config.dialog_close_polls;
        for poll in 0..=polls {
            if self.label_visible(frame, UiLabel::AddRow).await.is_some() {
                return true;
            }
            if poll == polls {
                break;
            }
            self.sleep(self.config.pause(0.5)).await;
            if !self.click_label(frame, UiLabel::Ok).await {
                self.click_label(frame, UiLabel::Cancel).await;
            }
        }
        warn!(polls, "Dialog still open after confirming, cancelling it");
        self.cancel_dialog(frame).await;
        false
    }
}
