//! Shared data types for quote records and the remote wire format

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canonical category label applied to every record fetched from the remote feed
pub const SERVER_CATEGORY: &str = "server";

/// A single quote. Identity for merging is `text`; `category` divergence on a
/// shared `text` is what reconciliation reports as a conflict.
///
/// Fields are read leniently so imported documents propagate without
/// per-entry validation: a missing field or `null` becomes an empty string,
/// and any other non-string value keeps its JSON text (`5` becomes `"5"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

impl QuoteRecord {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }

    /// Copy with surrounding whitespace removed from both fields
    pub fn trimmed(&self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            category: self.category.trim().to_string(),
        }
    }

    /// Both fields are non-empty after trimming
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty() && !self.category.trim().is_empty()
    }

    /// Same text, different category
    pub fn conflicts_with(&self, other: &QuoteRecord) -> bool {
        self.text == other.text && self.category != other.category
    }
}

impl std::fmt::Display for QuoteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" ({})", self.text, self.category)
    }
}

/// Ordered sequence of quotes; insertion order is significant
pub type Collection = Vec<QuoteRecord>;

/// Item shape returned by the remote feed. Only `title` is carried into the
/// local model; other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePost {
    pub title: String,
}

impl RemotePost {
    /// Map a remote item into a quote under the given category label
    pub fn into_record(self, category: &str) -> QuoteRecord {
        QuoteRecord::new(self.title, category)
    }
}
