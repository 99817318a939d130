use tempo_sync::mapping::{CostCodeMapping, MappingError, MappingStore};

fn mapping(cost_code: &str, ticket: &str) -> CostCodeMapping {
    CostCodeMapping {
        cost_code: cost_code.to_string(),
        display_name: "Platform".to_string(),
        sample_ticket: ticket.to_string(),
    }
}

#[test]
fn test_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MappingStore::load(dir.path().join("mapping.json")).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.cost_code_for("ACC-1"), None);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mapping.json");

    let mut store = MappingStore::load(&path).unwrap();
    store.upsert("ACC-1", mapping("1234-56789-001", "ABC-1"));
    store.upsert("ACC-2", mapping("1234-56789-002", "ABC-2"));
    store.save().unwrap();

    let reloaded = MappingStore::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get("ACC-2"), Some(&mapping("1234-56789-002", "ABC-2")));
}

#[test]
fn test_upsert_is_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappingStore::empty(dir.path().join("mapping.json"));

    assert!(store.upsert("ACC-1", mapping("1234-56789-001", "ABC-1")).is_none());
    let previous = store.upsert("ACC-1", mapping("9999-00000-111", "ABC-7"));

    assert_eq!(previous.unwrap().cost_code, "1234-56789-001");
    assert_eq!(store.len(), 1);
    assert_eq!(store.cost_code_for("ACC-1"), Some("9999-00000-111"));
}

#[test]
fn test_reads_legacy_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapping.json");
    std::fs::write(
        &path,
        r#"{"ACC-1": {"unit4_arbauft": "1234-56789-001", "tempo_name": "Platform", "sample_ticket": "ABC-1"}}"#,
    )
    .unwrap();

    let store = MappingStore::load(&path).unwrap();
    assert_eq!(store.get("ACC-1"), Some(&mapping("1234-56789-001", "ABC-1")));
}

#[test]
fn test_invalid_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapping.json");
    std::fs::write(&path, "{ broken").unwrap();

    let err = MappingStore::load(&path).unwrap_err();
    assert!(matches!(err, MappingError::Parse { .. }));
}
