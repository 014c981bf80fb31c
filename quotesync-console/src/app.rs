//! Main console application
//!
//! Wires durable storage, the record store, the remote gateway and the sync
//! machinery together and exposes the user-facing operations.

use crate::category_index::{filter_quotes, random_quote, CategoryFilter};
use crate::conflict_resolver::{ConflictResolver, ManualResolution};
use crate::outbound_queue::OutboundQueue;
use crate::quote_store::QuoteStore;
use crate::scheduler::SyncScheduler;
use crate::storage::{RocksStorage, Storage};
use crate::sync_manager::{SyncManager, SyncOutcome, SyncStatsSnapshot, SyncStatus};
use crate::{transfer, Config, ConsoleError, Result};
use quotesync_client::{Client, QuoteRecord, RemoteGateway};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// How often `run` checks the shutdown flag
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Operator requests accepted while `run` is syncing periodically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCommand {
    Sync,
    Resolve,
    Status,
}

impl std::str::FromStr for RunCommand {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sync" => Ok(RunCommand::Sync),
            "resolve" => Ok(RunCommand::Resolve),
            "status" => Ok(RunCommand::Status),
            other => Err(ConsoleError::Validation(format!(
                "Unknown command '{}'. Commands: sync, resolve, status",
                other
            ))),
        }
    }
}

/// Point-in-time summary for the `status` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub quotes: usize,
    pub categories: Vec<String>,
    pub selected: CategoryFilter,
    pub pending_conflicts: Vec<QuoteRecord>,
    pub sync: SyncStatsSnapshot,
    pub publishes_pending: u64,
}

pub struct App {
    config: Config,
    store: Arc<QuoteStore>,
    manager: Arc<SyncManager>,
    outbound: OutboundQueue,
    shutdown_flag: Arc<AtomicBool>,
}

impl App {
    /// Open the RocksDB store under the data directory and connect to the
    /// configured server
    pub async fn new(config: Config, shutdown_flag: Arc<AtomicBool>) -> Result<Self> {
        let store_path = config.store_path();
        let storage = tokio::task::spawn_blocking(move || RocksStorage::open(store_path))
            .await
            .map_err(|e| ConsoleError::Storage(format!("Failed to open storage: {}", e)))??;
        debug!("Quote store ready at {}", storage.path().display());

        let client = Client::new(config.client_config())?;
        info!("Using remote feed at {}", config.server_url);

        Ok(Self::with_gateway(
            config,
            Arc::new(storage),
            Arc::new(client),
            shutdown_flag,
        ))
    }

    /// Build the application over explicit storage and gateway
    pub fn with_gateway(
        config: Config,
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn RemoteGateway>,
        shutdown_flag: Arc<AtomicBool>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(config.status_channel_capacity.max(1));
        let conflicts = Arc::new(ConflictResolver::open(storage.as_ref()));
        let store = Arc::new(QuoteStore::open(storage));
        let manager = Arc::new(SyncManager::new(
            gateway.clone(),
            store.clone(),
            conflicts,
            status_tx.clone(),
        ));
        let outbound = OutboundQueue::start(gateway, status_tx);

        Self {
            config,
            store,
            manager,
            outbound,
            shutdown_flag,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<QuoteStore> {
        &self.store
    }

    pub fn manager(&self) -> &Arc<SyncManager> {
        &self.manager
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.manager.subscribe()
    }

    /// Store a new quote and queue it for publishing.
    ///
    /// The local add stands whether or not the publish later succeeds.
    pub async fn add_quote(&self, text: &str, category: &str) -> Result<QuoteRecord> {
        let record = self.store.add(text, category).await?;
        self.outbound.enqueue(record.clone());
        Ok(record)
    }

    pub async fn import_file(&self, path: &Path) -> Result<usize> {
        transfer::import_file(&self.store, path).await
    }

    /// Export to `dir`, or to the configured export directory
    pub async fn export(&self, dir: Option<&Path>) -> Result<PathBuf> {
        let dir = dir.unwrap_or(self.config.export_dir.as_path());
        transfer::export_to_dir(&self.store, dir).await
    }

    /// Random quote under the persisted category selection
    pub async fn random_quote(&self) -> Option<QuoteRecord> {
        let filter = self.store.categories().effective_filter();
        let quotes = self.store.snapshot().await;
        random_quote(&quotes, &filter).cloned()
    }

    pub async fn list(&self, filter: &CategoryFilter) -> Vec<QuoteRecord> {
        let quotes = self.store.snapshot().await;
        filter_quotes(&quotes, filter).into_iter().cloned().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.store.categories().categories()
    }

    /// Persist the category selection used by `random_quote`
    pub async fn select_category(&self, filter: CategoryFilter) -> Result<CategoryFilter> {
        if let CategoryFilter::Category(name) = &filter {
            if !self.store.categories().contains(name) {
                return Err(ConsoleError::Validation(format!("Unknown category: {}", name)));
            }
        }
        self.store.categories().set_last_selected(&filter)?;
        Ok(filter)
    }

    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.manager.sync_now().await
    }

    pub async fn resolve_conflicts(&self) -> Result<Option<ManualResolution>> {
        self.manager.resolve_manually().await
    }

    pub async fn status(&self) -> AppStatus {
        AppStatus {
            quotes: self.store.len().await,
            categories: self.categories(),
            selected: self.store.categories().effective_filter(),
            pending_conflicts: self.manager.conflicts().pending().await,
            sync: self.manager.stats(),
            publishes_pending: self.outbound.stats().pending(),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Sync periodically, reporting status and serving operator commands,
    /// until shutdown is requested. A closed command channel only stops
    /// command handling.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<RunCommand>) -> Result<()> {
        let mut status_rx = self.subscribe();
        let schedule = SyncScheduler::start(self.manager.clone(), self.config.sync_interval());
        let mut poll = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);
        let mut commands_open = true;

        while !self.is_shutdown_requested() {
            tokio::select! {
                event = status_rx.recv() => match event {
                    Ok(status) => report_status(&status),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Status reporting fell behind, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
                _ = poll.tick() => {}
            }
        }

        info!("Shutting down periodic sync");
        schedule.cancel().await;
        self.shutdown().await;
        Ok(())
    }

    async fn handle_command(&self, command: RunCommand) {
        debug!("Handling operator command {:?}", command);
        match command {
            RunCommand::Sync => {
                // Failures are already reported on the status channel
                if let Err(e) = self.sync_now().await {
                    debug!("Requested sync failed: {}", e);
                }
            }
            RunCommand::Resolve => match self.resolve_conflicts().await {
                Ok(Some(_)) => {}
                Ok(None) => info!("No conflicts to resolve"),
                Err(e) => warn!("Manual resolution failed: {}", e),
            },
            RunCommand::Status => {
                let status = self.status().await;
                info!(
                    "{} quotes, {} categories, filter {}, {} pending conflicts, {} publishes queued",
                    status.quotes,
                    status.categories.len(),
                    status.selected,
                    status.pending_conflicts.len(),
                    status.publishes_pending
                );
            }
        }
    }

    /// Drain queued publishes
    pub async fn shutdown(self) {
        debug!("Waiting for queued publishes");
        self.outbound.shutdown().await;
    }
}

fn report_status(status: &SyncStatus) {
    match status {
        SyncStatus::ConflictsDetected { .. }
        | SyncStatus::Failed { .. }
        | SyncStatus::PublishFailed { .. } => warn!("{}", status),
        SyncStatus::Syncing | SyncStatus::Coalesced => debug!("{}", status),
        _ => info!("{}", status),
    }
}

#[cfg(test)]
mod tests;
