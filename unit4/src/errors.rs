use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("DevTools protocol error in {method}: {message}")]
    Protocol { method: String, message: String },

    #[error("Script evaluation failed: {0}")]
    ScriptError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Element is detached from DOM: {0}")]
    ElementDetached(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Element is not editable: {0}")]
    ElementNotEditable(String),

    #[error("Frame is gone: {0}")]
    FrameDetached(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// Whether a retry after re-resolving the frame can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_)
                | AutomationError::Timeout(_)
                | AutomationError::ElementDetached(_)
                | AutomationError::ElementNotVisible(_)
                | AutomationError::FrameDetached(_)
                | AutomationError::ScriptError(_)
        )
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::Internal(format!("json: {e}"))
    }
}
