//! Record store owning the quote collection and its durable mirror
//! 
//! Every mutation (user add, import, reconciliation, manual resolution) goes
//! through one commit path: it takes the single-writer lock, applies the change
//! to a working copy, persists the full collection and only then commits it to
//! memory and refreshes the category index. A failed change or a failed persist
//! leaves both memory and storage exactly as they were. Nothing awaits after
//! the in-memory commit, so a dropped caller never observes half a mutation.
//!
//! Reconciliation and manual resolution also replace the pending conflict
//! batch; [`QuoteStore::mutate_with_conflicts`] writes it in the same storage
//! batch as the collection.

use crate::category_index::CategoryIndex;
use crate::storage::{Storage, PENDING_CONFLICTS_KEY, QUOTES_KEY};
use crate::{ConsoleError, Result};
use quotesync_client::{Collection, QuoteRecord};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Load the persisted collection; absent or corrupt state yields an empty one
pub fn load(storage: &dyn Storage) -> Collection {
    let bytes = match storage.get(QUOTES_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read persisted quotes, starting empty: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Collection>(&bytes) {
        Ok(collection) => collection,
        Err(e) => {
            warn!("Persisted quotes are unparsable, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// Overwrite persisted state with the full collection
pub fn persist(storage: &dyn Storage, collection: &[QuoteRecord]) -> Result<()> {
    let bytes = serde_json::to_vec(collection)?;
    storage.put(QUOTES_KEY, &bytes)
}

/// Trim and validate, then append one record
pub fn append(collection: &mut Collection, record: QuoteRecord) -> Result<QuoteRecord> {
    if !record.is_valid() {
        return Err(ConsoleError::Validation(
            "quote text and category cannot be empty".to_string(),
        ));
    }
    let record = record.trimmed();

    collection.push(record.clone());
    Ok(record)
}

/// Overwrite the first record whose text equals `matcher` in place.
///
/// Returns the index written, or [`ConsoleError::NotFound`] when no record
/// matches; the collection is untouched in that case.
pub fn replace_at(collection: &mut Collection, matcher: &str, record: QuoteRecord) -> Result<usize> {
    match collection.iter().position(|existing| existing.text == matcher) {
        Some(index) => {
            collection[index] = record;
            Ok(index)
        }
        None => Err(ConsoleError::NotFound {
            text: matcher.to_string(),
        }),
    }
}

/// Owner of the in-memory collection and its durable mirror
#[derive(Debug)]
pub struct QuoteStore {
    storage: Arc<dyn Storage>,
    quotes: Mutex<Collection>,
    categories: CategoryIndex,
}

impl QuoteStore {
    /// Open the store, loading persisted state fail-soft
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let quotes = load(storage.as_ref());
        info!("Loaded {} quotes from storage", quotes.len());

        let categories = CategoryIndex::new(storage.clone(), &quotes);
        Self {
            storage,
            quotes: Mutex::new(quotes),
            categories,
        }
    }

    /// Apply a change under the single-writer lock, persist, then commit
    pub async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<T>,
    {
        self.commit(|quotes| Ok((change(quotes)?, None))).await
    }

    /// Like [`QuoteStore::mutate`], also replacing the persisted conflict batch
    /// the change yields. Collection and batch are written atomically.
    pub async fn mutate_with_conflicts<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<(T, Vec<QuoteRecord>)>,
    {
        self.commit(|quotes| {
            let (value, conflicts) = change(quotes)?;
            Ok((value, Some(conflicts)))
        })
        .await
    }

    async fn commit<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<(T, Option<Vec<QuoteRecord>>)>,
    {
        let mut quotes = self.quotes.lock().await;
        let mut working = quotes.clone();

        let (value, conflicts) = change(&mut working)?;
        match conflicts {
            Some(conflicts) => {
                let quotes_bytes = serde_json::to_vec(&working)?;
                let conflict_bytes = serde_json::to_vec(&conflicts)?;
                self.storage.put_batch(&[
                    (QUOTES_KEY, quotes_bytes.as_slice()),
                    (PENDING_CONFLICTS_KEY, conflict_bytes.as_slice()),
                ])?;
            }
            None => persist(self.storage.as_ref(), &working)?,
        }

        *quotes = working;
        self.categories.refresh(&quotes);
        Ok(value)
    }

    /// Add a user-entered quote
    #[instrument(skip(self))]
    pub async fn add(&self, text: &str, category: &str) -> Result<QuoteRecord> {
        let record = self
            .mutate(|quotes| append(quotes, QuoteRecord::new(text, category)))
            .await?;
        debug!("Added quote {}", record);
        Ok(record)
    }

    /// Append imported records as-is; returns how many were added
    pub async fn import(&self, records: Vec<QuoteRecord>) -> Result<usize> {
        let count = records.len();
        self.mutate(move |quotes| {
            quotes.extend(records);
            Ok(count)
        })
        .await
    }

    /// Overwrite the first record with matching text
    pub async fn replace_at(&self, matcher: &str, record: QuoteRecord) -> Result<usize> {
        self.mutate(|quotes| replace_at(quotes, matcher, record)).await
    }

    /// Copy of the current collection
    pub async fn snapshot(&self) -> Collection {
        self.quotes.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.quotes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.quotes.lock().await.is_empty()
    }

    pub fn categories(&self) -> &CategoryIndex {
        &self.categories
    }
}
