//! Browser automation for the Unit4 ERP weekly timesheet.
//!
//! Unit4 offers no API for time booking, so rows are read and written
//! through the web UI. Every row this crate writes carries a `[ID:<n>]`
//! marker in its description; the marker is the only identity used to
//! find, compare and delete rows on later runs.

pub mod cdp;
pub mod config;
pub mod engine;
pub mod errors;
mod extract;
pub mod frame;
pub mod labels;
pub mod mutate;
pub mod operator;
pub mod patterns;
pub mod period;
pub mod readiness;
pub mod retry;
pub mod selector;
pub mod session;
pub mod timesheet;
mod ui;
mod week;
#[cfg(any(test, feature = "test-util"))]
#[path = "tests/fake_page.rs"]
pub mod fake_page;
#[cfg(test)]
mod tests;

pub use cdp::CdpEngine;
pub use config::DriverConfig;
pub use engine::{BrowserEngine, ClickKind, ElementRef, FrameInfo, Key, Scope};
pub use errors::AutomationError;
pub use labels::{Labels, UiLabel};
pub use operator::{ConsoleOperator, Operator, ScriptedOperator};
pub use period::Period;
pub use readiness::ReadinessState;
pub use retry::{Attempt, RetryExhausted, RetryPolicy};
pub use selector::Selector;
pub use session::Unit4Driver;
pub use timesheet::{DeletionReport, NewEntry, RemoteEntry, Timesheet};
