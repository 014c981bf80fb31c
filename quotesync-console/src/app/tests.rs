//! Application wiring tests

use crate::category_index::CategoryFilter;
use crate::storage::MemoryStorage;
use crate::sync_manager::{SyncOutcome, SyncStatus};
use crate::app::RunCommand;
use crate::storage::Storage;
use crate::{App, Config, ConsoleError};
use async_trait::async_trait;
use quotesync_client::{QuoteRecord, RemoteGateway, SyncError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::{mpsc, Mutex};

fn q(text: &str, category: &str) -> QuoteRecord {
    QuoteRecord::new(text, category)
}

fn category(name: &str) -> CategoryFilter {
    CategoryFilter::Category(name.to_string())
}

/// In-process stand-in for the remote feed
#[derive(Debug, Default)]
struct FakeGateway {
    snapshot: Mutex<Vec<QuoteRecord>>,
    published: Mutex<Vec<QuoteRecord>>,
    reject_publish: AtomicBool,
}

impl FakeGateway {
    fn serving(snapshot: Vec<QuoteRecord>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn fetch_snapshot(&self) -> quotesync_client::Result<Vec<QuoteRecord>> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn publish(&self, record: &QuoteRecord) -> quotesync_client::Result<()> {
        if self.reject_publish.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.published.lock().await.push(record.clone());
        Ok(())
    }
}

/// Create a test configuration with temporary directories
fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.data_dir = temp_dir.path().join("data");
    config.export_dir = temp_dir.path().join("exports");
    config.server_url = "http://localhost:8080".to_string();
    config.sync_interval_secs = 1;

    (config, temp_dir)
}

fn test_app(gateway: Arc<FakeGateway>) -> (App, TempDir) {
    let (config, temp_dir) = create_test_config();
    let app = App::with_gateway(
        config,
        Arc::new(MemoryStorage::new()),
        gateway,
        Arc::new(AtomicBool::new(false)),
    );
    (app, temp_dir)
}

#[tokio::test]
async fn test_app_initialization() {
    let (config, temp_dir) = create_test_config();
    let shutdown_flag = Arc::new(AtomicBool::new(false));

    let app = App::new(config, shutdown_flag).await;
    assert!(app.is_ok(), "App should initialize successfully");

    let app = app.unwrap();
    assert!(!app.is_shutdown_requested(), "Shutdown should not be requested initially");
    assert!(app.store().is_empty().await);
    assert!(temp_dir.path().join("data").join("quotes.db").exists());

    app.shutdown().await;
}

#[tokio::test]
async fn test_app_reopens_persisted_quotes() {
    let (config, _temp_dir) = create_test_config();

    let app = App::new(config.clone(), Arc::new(AtomicBool::new(false))).await.unwrap();
    app.store().add("Stay hungry", "life").await.unwrap();
    app.select_category(category("life")).await.unwrap();
    app.shutdown().await;

    let reopened = App::new(config, Arc::new(AtomicBool::new(false))).await.unwrap();
    assert_eq!(reopened.store().snapshot().await, vec![q("Stay hungry", "life")]);
    assert_eq!(reopened.status().await.selected, CategoryFilter::Category("life".to_string()));
    reopened.shutdown().await;
}

#[tokio::test]
async fn test_add_quote_publishes() {
    let gateway = Arc::new(FakeGateway::default());
    let (app, _temp_dir) = test_app(gateway.clone());

    let record = app.add_quote("  Be here now ", " zen ").await.unwrap();
    assert_eq!(record, q("Be here now", "zen"));
    app.shutdown().await;

    assert_eq!(*gateway.published.lock().await, vec![q("Be here now", "zen")]);
}

#[tokio::test]
async fn test_add_quote_survives_publish_failure() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.reject_publish.store(true, Ordering::SeqCst);
    let (app, _temp_dir) = test_app(gateway.clone());
    let mut status_rx = app.subscribe();

    app.add_quote("Keep going", "grit").await.unwrap();
    let store = app.store().clone();
    app.shutdown().await;

    assert_eq!(store.snapshot().await, vec![q("Keep going", "grit")]);
    assert!(gateway.published.lock().await.is_empty());
    assert!(matches!(
        status_rx.recv().await.unwrap(),
        SyncStatus::PublishFailed { .. }
    ));
}

#[tokio::test]
async fn test_add_quote_rejects_empty_fields() {
    let gateway = Arc::new(FakeGateway::default());
    let (app, _temp_dir) = test_app(gateway.clone());

    assert!(matches!(
        app.add_quote("   ", "zen").await,
        Err(ConsoleError::Validation(_))
    ));
    assert!(matches!(
        app.add_quote("Quote", "").await,
        Err(ConsoleError::Validation(_))
    ));
    assert!(app.store().is_empty().await);

    app.shutdown().await;
    assert!(gateway.published.lock().await.is_empty());
}

#[tokio::test]
async fn test_select_category_drives_random_quote() {
    let (app, _temp_dir) = test_app(Arc::new(FakeGateway::default()));
    app.store().add("Alpha", "one").await.unwrap();
    app.store().add("Beta", "two").await.unwrap();

    assert!(matches!(
        app.select_category(category("missing")).await,
        Err(ConsoleError::Validation(_))
    ));

    let filter = app.select_category(category("two")).await.unwrap();
    assert_eq!(filter, CategoryFilter::Category("two".to_string()));
    for _ in 0..10 {
        assert_eq!(app.random_quote().await, Some(q("Beta", "two")));
    }

    assert_eq!(app.select_category(CategoryFilter::All).await.unwrap(), CategoryFilter::All);
    assert_eq!(app.list(&CategoryFilter::All).await.len(), 2);

    app.shutdown().await;
}

#[tokio::test]
async fn test_export_defaults_to_configured_dir() {
    let (app, temp_dir) = test_app(Arc::new(FakeGateway::default()));
    app.store().add("Alpha", "one").await.unwrap();

    let path = app.export(None).await.unwrap();
    assert_eq!(path, temp_dir.path().join("exports").join("quotes.json"));

    let contents = fs::read_to_string(&path).await.unwrap();
    let exported: Vec<QuoteRecord> = serde_json::from_str(&contents).unwrap();
    assert_eq!(exported, vec![q("Alpha", "one")]);

    app.shutdown().await;
}

#[tokio::test]
async fn test_status_reports_pending_conflicts() {
    let gateway = Arc::new(FakeGateway::serving(vec![q("A", "server"), q("B", "server")]));
    let (app, _temp_dir) = test_app(gateway);
    app.store().add("A", "mine").await.unwrap();

    let outcome = app.sync_now().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));

    let status = app.status().await;
    assert_eq!(status.quotes, 2);
    assert_eq!(status.pending_conflicts, vec![q("A", "mine")]);
    assert_eq!(status.categories, vec!["server".to_string()]);
    assert_eq!(status.sync.passes_completed, 1);

    let resolution = app.resolve_conflicts().await.unwrap().unwrap();
    assert_eq!(resolution.reverted, 1);
    assert!(app.status().await.pending_conflicts.is_empty());

    app.shutdown().await;
}

#[tokio::test]
async fn test_run_stops_on_shutdown_flag() {
    let gateway = Arc::new(FakeGateway::serving(vec![q("Remote", "server")]));
    let (config, _temp_dir) = create_test_config();
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let app = App::with_gateway(
        config,
        Arc::new(MemoryStorage::new()),
        gateway,
        shutdown_flag.clone(),
    );
    let store = app.store().clone();

    let (_commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(app.run(commands_rx));

    // The first pass runs immediately
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.is_empty().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_flag.store(true, Ordering::SeqCst);
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(store.snapshot().await, vec![q("Remote", "server")]);
}

fn shared_app(storage: Arc<MemoryStorage>, gateway: Arc<FakeGateway>) -> App {
    let (config, _temp_dir) = create_test_config();
    App::with_gateway(config, storage, gateway, Arc::new(AtomicBool::new(false)))
}

#[tokio::test]
async fn test_pending_conflicts_survive_restart() {
    let storage = Arc::new(MemoryStorage::new());
    let gateway = Arc::new(FakeGateway::serving(vec![q("A", "Y")]));

    let first = shared_app(storage.clone(), gateway.clone());
    first.store().add("A", "X").await.unwrap();
    first.sync_now().await.unwrap();
    assert_eq!(first.store().snapshot().await, vec![q("A", "Y")]);
    first.shutdown().await;

    let second = shared_app(storage.clone(), gateway.clone());
    assert_eq!(second.status().await.pending_conflicts, vec![q("A", "X")]);

    let resolution = second.resolve_conflicts().await.unwrap();
    assert_eq!(resolution.map(|r| r.collection), Some(vec![q("A", "X")]));
    second.shutdown().await;

    let third = shared_app(storage, gateway);
    assert!(third.status().await.pending_conflicts.is_empty());
    assert_eq!(third.store().snapshot().await, vec![q("A", "X")]);
    third.shutdown().await;
}

#[tokio::test]
async fn test_category_named_all_can_be_selected() {
    let storage = Arc::new(MemoryStorage::new());
    let gateway = Arc::new(FakeGateway::default());

    let app = shared_app(storage.clone(), gateway.clone());
    app.store().add("Everything", "all").await.unwrap();
    app.store().add("Something", "other").await.unwrap();

    assert_eq!(app.select_category(category("all")).await.unwrap(), category("all"));
    app.shutdown().await;

    let reopened = shared_app(storage.clone(), gateway);
    assert_eq!(reopened.status().await.selected, category("all"));
    for _ in 0..10 {
        assert_eq!(reopened.random_quote().await, Some(q("Everything", "all")));
    }

    reopened.select_category(CategoryFilter::All).await.unwrap();
    assert_eq!(reopened.status().await.selected, CategoryFilter::All);
    assert!(storage.get(crate::storage::LAST_CATEGORY_KEY).unwrap().is_some());
    reopened.shutdown().await;
}

#[test]
fn test_run_command_parsing() {
    assert_eq!("sync".parse::<RunCommand>().unwrap(), RunCommand::Sync);
    assert_eq!(" Resolve \n".parse::<RunCommand>().unwrap(), RunCommand::Resolve);
    assert_eq!("status".parse::<RunCommand>().unwrap(), RunCommand::Status);
    assert!(matches!(
        "bogus".parse::<RunCommand>(),
        Err(ConsoleError::Validation(_))
    ));
}

#[tokio::test]
async fn test_run_serves_resolve_command() {
    let gateway = Arc::new(FakeGateway::serving(vec![q("A", "Y")]));
    let (mut config, _temp_dir) = create_test_config();
    config.sync_interval_secs = 3600;
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let app = App::with_gateway(
        config,
        Arc::new(MemoryStorage::new()),
        gateway,
        shutdown_flag.clone(),
    );
    app.store().add("A", "X").await.unwrap();
    let store = app.store().clone();
    let conflicts = app.manager().conflicts().clone();

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(app.run(commands_rx));

    // The immediate scheduled pass applies the remote version
    tokio::time::timeout(Duration::from_secs(5), async {
        while !conflicts.is_pending().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(store.snapshot().await, vec![q("A", "Y")]);

    commands_tx.send(RunCommand::Status).unwrap();
    commands_tx.send(RunCommand::Resolve).unwrap();
    drop(commands_tx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while conflicts.is_pending().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(store.snapshot().await, vec![q("A", "X")]);

    shutdown_flag.store(true, Ordering::SeqCst);
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
}
