use std::sync::Arc;

use crate::fake_page::{FakePage, FakeRow};
use super::{driver_for, week_start};
use crate::operator::ScriptedOperator;
use crate::patterns::{UNKNOWN_TICKET, ZERO_COST_CODE};

#[tokio::test]
async fn test_extract_returns_one_entry_per_marker() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(week_start()).opened().with_rows(vec![
        FakeRow::marked(101, "ABC-1", "1234-56789-001"),
        FakeRow::marked(102, "ABC-2", "1234-56789-002"),
        FakeRow::unmarked("Team meeting"),
    ]));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let mut entries = driver.extract_marked().await;
    entries.sort_by_key(|e| e.worklog_id);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].worklog_id, 101);
    assert_eq!(entries[0].ticket_key, "ABC-1");
    assert_eq!(entries[0].cost_code, "1234-56789-001");
    assert_eq!(entries[1].worklog_id, 102);
    assert_eq!(entries[1].ticket_key, "ABC-2");
    assert!(entries.iter().all(|e| !e.is_malformed()));
}

#[tokio::test]
async fn test_extract_reads_marker_from_input_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut row = FakeRow::marked(7, "XYZ-9", "1111-22222-333");
    row.as_input = true;
    let page = Arc::new(FakePage::new(week_start()).opened().with_rows(vec![row]));
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let entries = driver.extract_marked().await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].worklog_id, 7);
    assert_eq!(entries[0].ticket_key, "XYZ-9");
    assert_eq!(entries[0].cost_code, "1111-22222-333");
}

#[tokio::test]
async fn test_extract_keeps_malformed_rows_with_sentinels() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(
        FakePage::new(week_start())
            .opened()
            .with_rows(vec![FakeRow::marked(55, "", "")]),
    );
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let entries = driver.extract_marked().await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ticket_key, UNKNOWN_TICKET);
    assert_eq!(entries[0].cost_code, ZERO_COST_CODE);
    assert!(entries[0].is_malformed());
}

#[tokio::test]
async fn test_extract_on_empty_timesheet() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(
        FakePage::new(week_start())
            .opened()
            .with_rows(vec![FakeRow::unmarked("Holiday")]),
    );
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    assert!(driver.extract_marked().await.is_empty());
}

#[tokio::test]
async fn test_extract_skips_unreadable_element_and_scans_rest_of_frame() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(
        FakePage::new(week_start())
            .opened()
            .with_rows(vec![
                FakeRow::marked(1, "ABC-1", "1234-56789-001"),
                FakeRow::marked(2, "ABC-2", "1234-56789-001"),
                FakeRow::marked(3, "ABC-3", "1234-56789-001"),
            ])
            .unreadable("[ID:1]"),
    );
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let mut entries = driver.extract_marked().await;
    entries.sort_by_key(|e| e.worklog_id);

    let ids: Vec<u64> = entries.iter().map(|e| e.worklog_id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(entries[0].ticket_key, "ABC-2");
}

#[tokio::test]
async fn test_scan_reports_frames_it_could_not_search() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(
        FakePage::new(week_start())
            .opened()
            .with_rows(vec![FakeRow::marked(4, "ABC-4", "1234-56789-001")]),
    );
    let driver = driver_for(&page, dir.path(), Arc::new(ScriptedOperator::default()));

    let scan = driver.scan_marked().await.unwrap();
    assert!(scan.is_conclusive());
    assert_eq!(scan.entries.len(), 1);

    page.break_field_scan();
    let scan = driver.scan_marked().await.unwrap();
    assert!(!scan.is_conclusive());
    assert_eq!(scan.failed_frames, 2);
}
