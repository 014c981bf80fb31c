//! Import and export of the quote collection as JSON documents

use crate::quote_store::QuoteStore;
use crate::{ConsoleError, Result};
use quotesync_client::QuoteRecord;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// File name of the exported artifact
pub const EXPORT_FILE_NAME: &str = "quotes.json";

/// Parse an import document.
///
/// The document must be a JSON array of objects. Entries are not validated
/// beyond that: missing fields become empty strings and are kept as-is.
pub fn parse_import(contents: &str) -> Result<Vec<QuoteRecord>> {
    serde_json::from_str::<Vec<QuoteRecord>>(contents)
        .map_err(|e| ConsoleError::Import(format!("invalid JSON file: {}", e)))
}

/// Import a file into the store; the collection is untouched on any error
#[instrument(skip(store))]
pub async fn import_file(store: &QuoteStore, path: &Path) -> Result<usize> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| ConsoleError::Import(format!("failed to read '{}': {}", path.display(), e)))?;

    let records = parse_import(&contents)?;
    let count = store.import(records).await?;
    info!("Imported {} quotes from {}", count, path.display());
    Ok(count)
}

/// Pretty-printed JSON of the collection
pub fn export_json(collection: &[QuoteRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(collection)?)
}

/// Write the current collection to `<dir>/quotes.json`
#[instrument(skip(store))]
pub async fn export_to_dir(store: &QuoteStore, dir: &Path) -> Result<PathBuf> {
    let collection = store.snapshot().await;
    let contents = export_json(&collection)?;

    fs::create_dir_all(dir).await?;
    let path = dir.join(EXPORT_FILE_NAME);
    fs::write(&path, contents).await?;

    info!("Exported {} quotes to {}", collection.len(), path.display());
    Ok(path)
}
