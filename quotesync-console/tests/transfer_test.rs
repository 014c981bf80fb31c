//! Import and export through files on disk

use quotesync_client::QuoteRecord;
use quotesync_console::storage::{MemoryStorage, RocksStorage};
use quotesync_console::quote_store::QuoteStore;
use quotesync_console::transfer::{export_to_dir, import_file, EXPORT_FILE_NAME};
use quotesync_console::ConsoleError;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

fn q(text: &str, category: &str) -> QuoteRecord {
    QuoteRecord::new(text, category)
}

fn multiset(records: &[QuoteRecord]) -> HashMap<QuoteRecord, usize> {
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(record.clone()).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn test_export_import_export_is_additive() {
    let temp_dir = TempDir::new().unwrap();
    let store = QuoteStore::open(Arc::new(MemoryStorage::new()));
    store.add("Alpha", "one").await.unwrap();
    store.add("Beta", "two").await.unwrap();
    store.add("Alpha", "one").await.unwrap();
    let original = store.snapshot().await;

    let first = export_to_dir(&store, temp_dir.path()).await.unwrap();
    assert_eq!(first.file_name().unwrap(), EXPORT_FILE_NAME);

    let imported = import_file(&store, &first).await.unwrap();
    assert_eq!(imported, original.len());

    let second_dir = temp_dir.path().join("again");
    let second = export_to_dir(&store, &second_dir).await.unwrap();
    let exported: Vec<QuoteRecord> =
        serde_json::from_str(&fs::read_to_string(&second).await.unwrap()).unwrap();

    let after = multiset(&exported);
    for (record, count) in multiset(&original) {
        assert!(after.get(&record).copied().unwrap_or(0) >= count);
    }
    assert_eq!(exported.len(), original.len() * 2);
}

#[tokio::test]
async fn test_unparsable_import_leaves_collection_unmodified() {
    let temp_dir = TempDir::new().unwrap();
    let store = QuoteStore::open(Arc::new(MemoryStorage::new()));
    store.add("Alpha", "one").await.unwrap();

    let cases = [
        ("not_json.json", "this is not json"),
        ("object.json", r#"{"text": "A", "category": "B"}"#),
        ("scalars.json", "[1, 2, 3]"),
    ];
    for (name, contents) in cases {
        let path = temp_dir.path().join(name);
        fs::write(&path, contents).await.unwrap();

        let err = import_file(&store, &path).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Import(_)), "{} should fail to import", name);
    }

    let missing = import_file(&store, &temp_dir.path().join("missing.json")).await;
    assert!(matches!(missing, Err(ConsoleError::Import(_))));

    assert_eq!(store.snapshot().await, vec![q("Alpha", "one")]);
}

#[tokio::test]
async fn test_malformed_entries_are_kept_as_is() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.json");
    fs::write(&path, r#"[{"text": "Only text"}, {}, {"text": "Both", "category": "c"}]"#)
        .await
        .unwrap();

    let store = QuoteStore::open(Arc::new(MemoryStorage::new()));
    assert_eq!(import_file(&store, &path).await.unwrap(), 3);
    assert_eq!(
        store.snapshot().await,
        vec![q("Only text", ""), q("", ""), q("Both", "c")]
    );
}

#[tokio::test]
async fn test_imported_quotes_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");
    let import_path = temp_dir.path().join("import.json");
    fs::write(&import_path, r#"[{"text": "Persisted", "category": "disk"}]"#)
        .await
        .unwrap();

    {
        let store = QuoteStore::open(Arc::new(RocksStorage::open(&db_path).unwrap()));
        import_file(&store, &import_path).await.unwrap();
    }

    let store = QuoteStore::open(Arc::new(RocksStorage::open(&db_path).unwrap()));
    assert_eq!(store.snapshot().await, vec![q("Persisted", "disk")]);
    assert_eq!(store.categories().categories(), vec!["disk".to_string()]);
}
