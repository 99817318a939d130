use std::collections::HashSet;
use tracing::{debug, info, instrument, trace};

use crate::engine::{ElementRef, FrameInfo, Scope};
use crate::errors::AutomationError;
use crate::patterns::{self, MARKER, MARKER_JS, MARKER_PREFIX};
use crate::selector::Selector;
use crate::session::Unit4Driver;
use crate::timesheet::RemoteEntry;

/// Accumulates entries across frames and passes, one per marker id.
#[derive(Debug, Default)]
struct Collected {
    seen: HashSet<u64>,
    entries: Vec<RemoteEntry>,
}

impl Collected {
    fn is_new(&self, worklog_id: u64) -> bool {
        !self.seen.contains(&worklog_id)
    }

    fn push(&mut self, worklog_id: u64, context: &str) {
        if self.seen.insert(worklog_id) {
            let entry = RemoteEntry::from_context(worklog_id, context);
            trace!(worklog_id, ticket = %entry.ticket_key, "marked row");
            self.entries.push(entry);
        }
    }
}

/// Markers found by one pass over every frame.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub entries: Vec<RemoteEntry>,
    /// Frames whose queries failed; their markers may be missing
    pub failed_frames: usize,
}

impl Scan {
    /// Whether a marker absent from `entries` is absent from the page.
    pub fn is_conclusive(&self) -> bool {
        self.failed_frames == 0
    }
}

/// Per-element reads fail when the node was re-rendered in between; such an
/// element is skipped and the rest of the frame is still scanned.
fn readable<T>(result: Result<T, AutomationError>, what: &str) -> Option<T> {
    result
        .map_err(|e| debug!("Skipping element, {} unreadable: {}", what, e))
        .ok()
}

impl Unit4Driver {
    /// Every row in the displayed period that carries a marker.
    ///
    /// Markers are looked for in tooltips, then in form values, then in
    /// visible text, across all frames. A marker seen twice yields one entry.
    #[instrument(skip(self))]
    pub async fn extract_marked(&self) -> Vec<RemoteEntry> {
        match self.scan_marked().await {
            Ok(scan) => scan.entries,
            Err(e) => {
                debug!("Listing frames failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`Unit4Driver::extract_marked`], but tells whether every frame
    /// could be searched.
    pub(crate) async fn scan_marked(&self) -> Result<Scan, AutomationError> {
        let frames = self.engine.frames().await?;

        let mut collected = Collected::default();
        let mut failed_frames = 0;
        for frame in &frames {
            match self.extract_from_frame(frame, &mut collected).await {
                Ok(()) => {}
                Err(AutomationError::FrameDetached(reason)) => {
                    debug!(frame = %frame.url, "Frame went away during scan: {}", reason);
                }
                Err(e) => {
                    failed_frames += 1;
                    debug!(frame = %frame.url, "Skipping rest of frame: {}", e);
                }
            }
        }
        info!(count = collected.entries.len(), failed_frames, "Marked entries found");
        Ok(Scan {
            entries: collected.entries,
            failed_frames,
        })
    }

    /// Only query failures abort the frame; a failed read skips one element.
    async fn extract_from_frame(
        &self,
        frame: &FrameInfo,
        collected: &mut Collected,
    ) -> Result<(), AutomationError> {
        let scope = Scope::from(frame);

        for el in self
            .engine
            .query(&scope, &Selector::title_contains(MARKER_PREFIX))
            .await?
        {
            let Some(title) = readable(self.engine.attribute(&el, "title").await, "title") else {
                continue;
            };
            self.collect_markers(&el, &title.unwrap_or_default(), collected)
                .await;
        }

        let fields = Selector::Tags {
            names: vec!["input".to_string(), "textarea".to_string()],
        };
        for el in self.engine.query(&scope, &fields).await? {
            let Some(value) = readable(self.engine.input_value(&el).await, "value") else {
                continue;
            };
            let value = value.unwrap_or_default();
            if value.contains(MARKER_PREFIX) {
                self.collect_markers(&el, &value, collected).await;
            }
        }

        for el in self.engine.query(&scope, &Selector::matches(MARKER_JS)).await? {
            if !readable(self.engine.is_visible(&el).await, "visibility").unwrap_or(false) {
                continue;
            }
            let Some(text) = readable(self.engine.inner_text(&el).await, "text") else {
                continue;
            };
            self.collect_markers(&el, &text, collected).await;
        }
        Ok(())
    }

    async fn collect_markers(&self, source: &ElementRef, text: &str, collected: &mut Collected) {
        let ids: Vec<u64> = MARKER
            .captures_iter(text)
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
            .filter(|id| collected.is_new(*id))
            .collect();
        if ids.is_empty() {
            return;
        }

        // A marker without its row still has to be reported, or its row
        // would never be deleted.
        let context = match self.row_context(source, text).await {
            Ok(context) => context,
            Err(e) => {
                debug!("Row of marker unreadable: {}", e);
                text.to_string()
            }
        };
        for id in ids {
            collected.push(id, &context);
        }
    }

    /// Text of the enclosing table row, with the marker source appended when
    /// the row text does not already contain it (tooltips are not row text).
    async fn row_context(&self, source: &ElementRef, text: &str) -> Result<String, AutomationError> {
        let row_text = match self.engine.closest_row(source).await? {
            Some(row) => self.engine.inner_text(&row).await?,
            None => return Ok(text.to_string()),
        };
        if patterns::parse_marker(&row_text).is_some() || row_text.contains(text) {
            Ok(row_text)
        } else {
            Ok(format!("{text} {row_text}"))
        }
    }
}
