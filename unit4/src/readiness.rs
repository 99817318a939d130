use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::labels::UiLabel;
use crate::session::Unit4Driver;

/// Whether the displayed period can be edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReadinessState {
    Unknown,
    Editable,
    /// Submitted or transferred; carries the status caption that was seen
    Locked(String),
    /// Neither state was recognised in time
    TimedOut,
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Editable | ReadinessState::Locked(_))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Unknown => write!(f, "unknown"),
            ReadinessState::Editable => write!(f, "editable"),
            ReadinessState::Locked(status) => write!(f, "locked ({status})"),
            ReadinessState::TimedOut => write!(f, "timed out"),
        }
    }
}

impl Unit4Driver {
    /// Poll until the period is recognised as editable or locked.
    ///
    /// A visible lock status wins over a visible add-row control. Running
    /// out of polls yields [`ReadinessState::TimedOut`], which callers treat
    /// as a warning.
    #[instrument(skip(self))]
    pub async fn await_readiness(&self) -> ReadinessState {
        let polls = self.config.readiness_polls.max(1);
        let mut state = ReadinessState::Unknown;
        for poll in 0..polls {
            let frame = match self.content_frame(poll > 0).await {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(poll, "Frame resolution failed: {}", e);
                    self.sleep(self.config.poll_interval()).await;
                    continue;
                }
            };

            if let Some(status) = self.label_visible(&frame, UiLabel::LockedStatuses).await {
                state = ReadinessState::Locked(status);
            } else if self.label_visible(&frame, UiLabel::AddRow).await.is_some() {
                state = ReadinessState::Editable;
            }

            if state.is_terminal() {
                info!(%state, "Timesheet state recognised");
                return state;
            }
            if poll + 1 < polls {
                self.sleep(self.config.poll_interval()).await;
            }
        }
        warn!(polls, "Timesheet state not recognised");
        ReadinessState::TimedOut
    }
}
