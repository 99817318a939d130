//! Tempo → Unit4 worklog sync.
//!
//! Worklogs come from Tempo, get their issue and account from Jira, their
//! cost-code from a local mapping file and are then written into the Unit4
//! timesheet through [`unit4::Unit4Driver`].

pub mod check;
pub mod clients;
pub mod config;
pub mod logging;
pub mod mapping;
pub mod prompt;
pub mod reconcile;
pub mod report;
pub mod worklog;

pub use config::AppConfig;
pub use mapping::{CostCodeMapping, MappingStore};
pub use reconcile::{apply, prepare, run_sync, SyncOptions, SyncOutcome, SyncRun};
pub use worklog::{RawWorklog, RemoteWorklog};
