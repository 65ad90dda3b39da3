//! Record types produced by a harvest
//!
//! `EntryRecord` is the accepted output for one catalog item and
//! `FailureRecord` the bookkeeping entry for a URL whose retries ran out.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Canonical field name -> value, in discovery order
pub type FieldMap = IndexMap<String, String>;

/// Canonical field holding the resolved main image
pub const IMAGE_URL_FIELD: &str = "Image URL";

/// Keys reserved for record bookkeeping in the serialized form
const RESERVED_KEYS: [&str; 2] = ["id", "source_url"];

/// One accepted catalog entry
///
/// Serialized as a flat JSON object: the canonical fields plus `id` and
/// `source_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: u64,

    pub source_url: String,

    #[serde(flatten)]
    pub fields: FieldMap,
}

impl EntryRecord {
    /// Builds a record, renaming any field that collides with a reserved key
    pub fn new(id: u64, source_url: impl Into<String>, fields: FieldMap) -> Self {
        let fields = fields
            .into_iter()
            .map(|(key, value)| {
                if RESERVED_KEYS.contains(&key.as_str()) {
                    (format!("{} (field)", key), value)
                } else {
                    (key, value)
                }
            })
            .collect();

        Self {
            id,
            source_url: source_url.into(),
            fields,
        }
    }

    /// Returns a field value by canonical name
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Best-effort display title (English title, then Arabic)
    pub fn title(&self) -> Option<&str> {
        self.get("Title")
            .or_else(|| self.get("Title (English)"))
            .or_else(|| self.get("Title (Arabic)"))
    }
}

/// A URL whose extraction (or listing harvest) exhausted every retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,

    /// Total attempts made, including the first one
    pub attempts: u32,

    pub last_error_timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Listing page number when the failure is a page harvest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl FailureRecord {
    pub fn new(url: impl Into<String>, attempts: u32, last_error: Option<String>) -> Self {
        Self {
            url: url.into(),
            attempts,
            last_error_timestamp: Utc::now(),
            last_error,
            page: None,
        }
    }

    /// Marks this failure as belonging to a listing page
    pub fn for_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns true if this failure came from harvesting a listing page
    pub fn is_listing(&self) -> bool {
        self.page.is_some()
    }
}
