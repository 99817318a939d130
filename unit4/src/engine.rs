use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// A document inside the page: the main frame or one of its embedded frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: String,
    pub url: String,
    pub is_main: bool,
}

/// Handle to an element resolved inside a frame.
///
/// Handles are only valid until the frame navigates; afterwards operations
/// on them fail with [`AutomationError::ElementDetached`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub frame_id: String,
    pub node: u64,
}

/// Where a query starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Frame(String),
    Element(ElementRef),
}

impl Scope {
    pub fn frame_id(&self) -> &str {
        match self {
            Scope::Frame(id) => id,
            Scope::Element(el) => &el.frame_id,
        }
    }
}

impl From<&FrameInfo> for Scope {
    fn from(frame: &FrameInfo) -> Self {
        Scope::Frame(frame.id.clone())
    }
}

impl From<&ElementRef> for Scope {
    fn from(el: &ElementRef) -> Self {
        Scope::Element(el.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Escape,
    SelectAll,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickKind {
    /// Pointer click at the element's centre
    #[default]
    Pointer,
    /// Pointer double click at the element's centre
    Double,
    /// `scrollIntoView` followed by `element.click()`, bypassing hit-testing
    Dom,
}

/// The common trait that every page engine must implement.
///
/// The driver only talks to the page through this trait, so the same driver
/// logic runs against a real browser and against in-memory pages in tests.
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Wait until no network request has been in flight for a short quiet window.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), AutomationError>;

    async fn title(&self) -> Result<String, AutomationError>;

    /// All frames of the page, main frame first.
    async fn frames(&self) -> Result<Vec<FrameInfo>, AutomationError>;

    /// Elements matching `selector` within `scope`, in document order.
    async fn query(
        &self,
        scope: &Scope,
        selector: &Selector,
    ) -> Result<Vec<ElementRef>, AutomationError>;

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AutomationError>;

    async fn inner_text(&self, element: &ElementRef) -> Result<String, AutomationError>;

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, AutomationError>;

    /// Current value of an input or textarea; `None` for other elements.
    async fn input_value(&self, element: &ElementRef) -> Result<Option<String>, AutomationError>;

    /// Nearest enclosing table row.
    async fn closest_row(&self, element: &ElementRef)
        -> Result<Option<ElementRef>, AutomationError>;

    async fn click(&self, element: &ElementRef, kind: ClickKind) -> Result<(), AutomationError>;

    /// Replace the value of an editable element as if typed.
    async fn fill(&self, element: &ElementRef, value: &str) -> Result<(), AutomationError>;

    /// Assign `value` from script and dispatch `input`/`change`.
    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<(), AutomationError>;

    async fn press(&self, key: Key) -> Result<(), AutomationError>;

    /// Type into whatever holds focus, one key at a time.
    async fn type_text(&self, text: &str, delay: Duration) -> Result<(), AutomationError>;

    /// Persist the authenticated session (cookies) to `path`.
    async fn save_session(&self, path: &Path) -> Result<(), AutomationError>;

    /// Restore a session written by [`BrowserEngine::save_session`].
    async fn restore_session(&self, path: &Path) -> Result<(), AutomationError>;

    async fn close(&self) -> Result<(), AutomationError>;
}
