use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::engine::{ClickKind, ElementRef, FrameInfo, Scope};
use crate::errors::AutomationError;
use crate::labels::UiLabel;
use crate::selector::Selector;
use crate::session::Unit4Driver;
use crate::timesheet::{DeletionReport, RemoteEntry};

impl Unit4Driver {
    /// Delete the rows of `entries`.
    ///
    /// Each pass marks the remaining rows, bulk-deletes, saves and re-scans;
    /// rows still present afterwards go into the next pass. A row only counts
    /// as deleted once a complete re-scan no longer finds its marker.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn delete_all(&self, entries: &[RemoteEntry]) -> DeletionReport {
        let mut report = DeletionReport {
            requested: entries.len(),
            ..DeletionReport::default()
        };
        if entries.is_empty() {
            return report;
        }
        if self.dry_run {
            info!("Dry run: would delete {} entries", entries.len());
            report.deleted = entries.len();
            return report;
        }

        let targets: HashSet<u64> = entries.iter().map(|e| e.worklog_id).collect();
        let mut remaining: Vec<RemoteEntry> = entries.to_vec();
        let passes = self.config.delete_passes.max(1);

        for pass in 1..=passes {
            self.close_dialogs().await;
            let frame = match self.content_frame(pass > 1).await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(pass, "No content frame: {}", e);
                    break;
                }
            };

            let mut marked = 0;
            for entry in &remaining {
                match self.mark_for_deletion(&frame, entry).await {
                    Ok(()) => marked += 1,
                    Err(e) => debug!(worklog_id = entry.worklog_id, "not marked: {}", e),
                }
            }
            info!(pass, marked, remaining = remaining.len(), "Rows marked for deletion");

            if marked > 0 {
                if self.config.confirm_deletions {
                    let question = format!(
                        "{marked} rows are marked in the browser. Type 'y' to delete them (anything else stops the sync)"
                    );
                    if !self.operator.confirm(&question).await {
                        warn!("Deletion declined by operator");
                        report.declined = true;
                        break;
                    }
                }
                if !self.click_label(&frame, UiLabel::Delete).await {
                    warn!("Delete control not found");
                } else {
                    self.wait_idle().await;
                    self.sleep(self.config.settle_delay()).await;
                    self.click_label(&frame, UiLabel::Yes).await;
                    self.click_label(&frame, UiLabel::Ok).await;
                    self.sleep(self.config.pause(2.0)).await;
                    self.save().await;
                }
            }

            match self.scan_marked().await {
                Ok(scan) if scan.is_conclusive() => {
                    let present: HashSet<u64> = scan
                        .entries
                        .into_iter()
                        .map(|e| e.worklog_id)
                        .filter(|id| targets.contains(id))
                        .collect();
                    remaining.retain(|e| present.contains(&e.worklog_id));
                }
                Ok(scan) => warn!(
                    pass,
                    failed_frames = scan.failed_frames,
                    "Re-scan incomplete, keeping all rows as remaining"
                ),
                Err(e) => warn!(pass, "Re-scan failed, keeping all rows as remaining: {}", e),
            }
            if remaining.is_empty() {
                break;
            }
            warn!(pass, left = remaining.len(), "Marked rows still present");
        }

        report.deleted = entries.len() - remaining.len();
        info!(
            deleted = report.deleted,
            failed = remaining.len(),
            declined = report.declined,
            "Deletion finished"
        );
        report
    }

    /// Tick the checkbox of the row carrying `entry`'s marker.
    async fn mark_for_deletion(&self, frame: &FrameInfo, entry: &RemoteEntry) -> Result<(), AutomationError> {
        let row = self
            .row_for_marker(frame, &entry.marker())
            .await?
            .ok_or_else(|| AutomationError::ElementNotFound(format!("row of {}", entry.marker())))?;
        let checkbox = self
            .engine
            .query(&Scope::from(&row), &Selector::Checkbox)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::ElementNotFound("row checkbox".to_string()))?;
        self.engine.click(&checkbox, ClickKind::Dom).await?;
        self.sleep(self.config.pause(0.3)).await;
        debug!(worklog_id = entry.worklog_id, "marked");
        Ok(())
    }

    /// Row by marker: the row of a cell whose tooltip carries the marker (the
    /// description cell), then the row of any element whose tooltip does,
    /// then a row whose visible text does.
    pub(crate) async fn row_for_marker(
        &self,
        frame: &FrameInfo,
        marker: &str,
    ) -> Result<Option<ElementRef>, AutomationError> {
        let scope = Scope::from(frame);
        let titled = [
            Selector::TitledCell {
                value: marker.to_string(),
            },
            Selector::title_contains(marker),
        ];
        for selector in &titled {
            for el in self.engine.query(&scope, selector).await? {
                if let Some(row) = self.engine.closest_row(&el).await? {
                    return Ok(Some(row));
                }
            }
        }

        let rows = self
            .engine
            .query(
                &scope,
                &Selector::RowContaining {
                    text: marker.to_string(),
                },
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
