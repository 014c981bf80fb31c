//! Durable key-value storage for the quote collection
//! 
//! The collection lives under a single key as a JSON array, the pending
//! conflict batch under a second and the selected category under a third. RocksDB backs the binary; the
//! in-memory map backs tests and embedders that bring their own durability.

use crate::Result;
use dashmap::DashMap;
use rocksdb::{Options, WriteBatch, DB};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Key holding the JSON-serialized collection
pub const QUOTES_KEY: &str = "quotes";

/// Key holding the last selected category filter
pub const LAST_CATEGORY_KEY: &str = "lastCategory";

/// Key holding the JSON-serialized conflict batch awaiting manual resolution
pub const PENDING_CONFLICTS_KEY: &str = "pendingConflicts";

/// Durable overwrite-in-full key-value storage
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write several keys atomically: all land or none do
    fn put_batch(&self, entries: &[(&str, &[u8])]) -> Result<()>;
}

/// RocksDB-backed storage
#[derive(Debug)]
pub struct RocksStorage {
    db: DB,
    path: PathBuf,
}

impl RocksStorage {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, &path)?;
        info!("Opened quote storage at {}", path.display());
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for RocksStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn put_batch(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put(key.as_bytes(), *value);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Vec<u8>>,
    /// When set, every `put` fails; lets tests exercise persist failures
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any serialization
    pub fn with_entry(self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(crate::ConsoleError::Storage(format!(
                "write to '{}' rejected",
                key
            )));
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn put_batch(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(crate::ConsoleError::Storage(format!(
                "batch write of {} keys rejected",
                entries.len()
            )));
        }
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }
}
