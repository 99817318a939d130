//! Session, frame, period and readiness handling against the fake page.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::fake_page::FakePage;
use super::{driver_for, week_start};
use crate::errors::AutomationError;
use crate::operator::{Operator, ScriptedOperator};
use crate::period::Period;
use crate::readiness::ReadinessState;
use crate::session::Unit4Driver;
use crate::tests::test_config;

/// Completes the login in the fake page when asked to pause.
struct LoginOperator {
    page: Arc<FakePage>,
    pauses: AtomicUsize,
}

#[async_trait::async_trait]
impl Operator for LoginOperator {
    async fn pause(&self, _message: &str) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.page.log_in();
    }

    async fn confirm(&self, _question: &str) -> bool {
        true
    }

    async fn ask(&self, _question: &str) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn test_connect_opens_timesheet_frame() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let operator = Arc::new(ScriptedOperator::default());
    let driver = driver_for(&page, dir.path(), operator.clone());

    let frame = driver.connect().await.unwrap();

    assert_eq!(frame.id, "content");
    assert!(frame.url.contains("ContentContainer"));
    assert_eq!(page.navigations(), 1);
    assert_eq!(page.session_saves(), 0);
    assert!(operator.pauses().is_empty());
}

#[tokio::test]
async fn test_connect_waits_for_login_and_stores_session() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()).logged_out());
    let operator = Arc::new(LoginOperator {
        page: page.clone(),
        pauses: AtomicUsize::new(0),
    });
    let driver = driver_for(&page, dir.path(), operator.clone());

    let frame = driver.connect().await.unwrap();

    assert_eq!(frame.id, "content");
    assert_eq!(operator.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(page.session_saves(), 1);
    assert!(dir.path().join("session.json").exists());
}

#[tokio::test]
async fn test_connect_restores_stored_session() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("session.json"), r#"{"cookies": []}"#).unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    driver.connect().await.unwrap();

    assert_eq!(page.session_restores(), 1);
}

#[tokio::test]
async fn test_connect_without_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let mut config = test_config(dir.path());
    config.url.clear();
    let driver = Unit4Driver::new(page.clone(), config, Arc::new(ScriptedOperator::default()));

    let err = driver.connect().await.unwrap_err();
    assert!(matches!(err, AutomationError::InvalidArgument(_)));
    assert_eq!(page.navigations(), 0);
}

#[tokio::test]
async fn test_frame_resolver_falls_back_to_main_frame() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let frame = driver.content_frame(true).await.unwrap();
    assert!(frame.is_main);
}

#[tokio::test]
async fn test_set_period_types_week_code() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()).opened());
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert!(driver.set_period(Period::new(2026, 5).unwrap()).await);
    assert_eq!(page.period(), "202605");
}

#[tokio::test]
async fn test_set_period_fails_without_period_control() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert!(!driver.set_period(Period::new(2026, 5).unwrap()).await);
    assert_eq!(page.period(), "");
}

#[tokio::test]
async fn test_readiness_editable_when_add_row_visible() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()).opened());
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert_eq!(driver.await_readiness().await, ReadinessState::Editable);
}

#[tokio::test]
async fn test_readiness_reports_lock_status() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()).opened().locked("Transferred"));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert_eq!(
        driver.await_readiness().await,
        ReadinessState::Locked("Transferred".to_string())
    );
}

#[tokio::test]
async fn test_readiness_times_out_when_timesheet_missing() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert_eq!(driver.await_readiness().await, ReadinessState::TimedOut);
}
