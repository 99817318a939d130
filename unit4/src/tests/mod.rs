mod driver_tests;
mod extraction_tests;

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

use crate::config::DriverConfig;
use crate::operator::Operator;
use crate::session::Unit4Driver;
use crate::fake_page::FakePage;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// Monday of ISO week 2026-W05.
pub fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 26).unwrap()
}

pub fn test_config(session_dir: &Path) -> DriverConfig {
    DriverConfig {
        url: "https://erp.example.com/".to_string(),
        session_file: session_dir.join("session.json"),
        ..DriverConfig::default().without_delays()
    }
}

pub fn driver_for(page: &Arc<FakePage>, session_dir: &Path, operator: Arc<dyn Operator>) -> Unit4Driver {
    init_tracing();
    Unit4Driver::new(page.clone(), test_config(session_dir), operator)
}
