//! Category index derived from the quote collection
//! 
//! Categories are recomputed from the collection after every mutation, in
//! first-seen order and without duplicates. The last selected filter is a
//! single persisted JSON scalar: `null` for all categories, otherwise the
//! category name, so a category literally called "all" stays selectable.

use crate::storage::{Storage, LAST_CATEGORY_KEY};
use crate::Result;
use quotesync_client::QuoteRecord;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Category filter applied when browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Category(String),
}

impl CategoryFilter {
    pub fn category(&self) -> Option<&str> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Category(name) => Some(name),
        }
    }

    pub fn matches(&self, record: &QuoteRecord) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Category(name) => record.category == *name,
        }
    }
}

impl From<Option<String>> for CategoryFilter {
    fn from(category: Option<String>) -> Self {
        category.map_or(CategoryFilter::All, CategoryFilter::Category)
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all categories"),
            CategoryFilter::Category(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Distinct categories in first-seen order
pub fn distinct_categories(collection: &[QuoteRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    collection
        .iter()
        .filter(|record| seen.insert(record.category.as_str()))
        .map(|record| record.category.clone())
        .collect()
}

/// Records matching the filter, in collection order
pub fn filter_quotes<'a>(collection: &'a [QuoteRecord], filter: &CategoryFilter) -> Vec<&'a QuoteRecord> {
    collection.iter().filter(|record| filter.matches(record)).collect()
}

/// Uniformly random record among those matching the filter
pub fn random_quote<'a>(collection: &'a [QuoteRecord], filter: &CategoryFilter) -> Option<&'a QuoteRecord> {
    let candidates = filter_quotes(collection, filter);
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[fastrand::usize(..candidates.len())])
}

/// Cached category set plus the persisted selection.
///
/// The set sits behind a blocking lock so a refresh never suspends: once the
/// record store commits a change, the index catches up before control returns.
#[derive(Debug)]
pub struct CategoryIndex {
    storage: Arc<dyn Storage>,
    categories: RwLock<Vec<String>>,
}

impl CategoryIndex {
    pub fn new(storage: Arc<dyn Storage>, collection: &[QuoteRecord]) -> Self {
        Self {
            storage,
            categories: RwLock::new(distinct_categories(collection)),
        }
    }

    /// Re-derive the category set from the collection
    pub fn refresh(&self, collection: &[QuoteRecord]) {
        let categories = distinct_categories(collection);
        debug!("Category index refreshed with {} categories", categories.len());
        *self.categories.write().unwrap_or_else(PoisonError::into_inner) = categories;
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c == category)
    }

    /// Last persisted selection; `All` when absent or unreadable
    pub fn last_selected(&self) -> CategoryFilter {
        let bytes = match self.storage.get(LAST_CATEGORY_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return CategoryFilter::All,
            Err(e) => {
                warn!("Failed to read last selected category, defaulting to all: {}", e);
                return CategoryFilter::All;
            }
        };

        match serde_json::from_slice::<Option<String>>(&bytes) {
            Ok(category) => category.into(),
            Err(e) => {
                warn!("Stored category selection is unparsable, defaulting to all: {}", e);
                CategoryFilter::All
            }
        }
    }

    pub fn set_last_selected(&self, filter: &CategoryFilter) -> Result<()> {
        let bytes = serde_json::to_vec(&filter.category())?;
        self.storage.put(LAST_CATEGORY_KEY, &bytes)?;
        debug!("Selected category filter: {}", filter);
        Ok(())
    }

    /// Persisted selection, falling back to `All` when that category is gone
    pub fn effective_filter(&self) -> CategoryFilter {
        match self.last_selected() {
            CategoryFilter::Category(name) if !self.contains(&name) => CategoryFilter::All,
            filter => filter,
        }
    }
}
