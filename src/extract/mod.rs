//! Metadata extraction from rendered detail pages
//!
//! Extraction is a cascade of interchangeable strategies, tried in order
//! until the accumulated fields satisfy the acceptance policy:
//!
//! 1. `StructuredStateExtractor`: the embedded application state
//! 2. `SectionHeuristicExtractor`: the labelled "Item Description" block
//! 3. `PatternMatchExtractor`: known labels anywhere in the visible text
//! 4. `GenericDomExtractor`: definition lists, tables and field containers
//!
//! The `ImageResolver` runs independently of the cascade on every page.

pub mod document;
mod generic;
mod image;
mod pattern;
mod pipeline;
pub mod recognizer;
mod section;
mod structured;

pub use document::DetailPage;
pub use generic::GenericDomExtractor;
pub use image::{is_valid_image_url, ImageResolver, IMAGE_SELECTORS};
pub use pattern::PatternMatchExtractor;
pub use pipeline::ExtractionPipeline;
pub use recognizer::{ContentDmRecognizer, FieldRecognizer};
pub use section::{parse_labelled_lines, SectionHeuristicExtractor};
pub use structured::{fields_from_state, parse_initial_state, StructuredStateExtractor};

use crate::session::SessionError;
use crate::state::{FieldMap, IMAGE_URL_FIELD};
use thiserror::Error;

/// Errors that prevent a detail page from being examined at all
///
/// A page that renders but yields too few fields is not an error; the
/// caller decides through `AcceptancePolicy`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One way of recovering fields from a rendered detail page
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Recovers whatever fields this strategy can find; never fails
    fn extract(&self, page: &DetailPage, recognizer: &dyn FieldRecognizer) -> FieldMap;
}

/// Decides whether an extracted field map is good enough to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptancePolicy {
    /// Minimum number of counted fields
    pub min_fields: usize,
    /// Fields that never count toward the minimum
    pub ignored: Vec<String>,
}

impl AcceptancePolicy {
    pub fn new(min_fields: usize) -> Self {
        Self {
            min_fields,
            ..Self::default()
        }
    }

    /// Number of fields that count toward acceptance
    pub fn counted_fields(&self, fields: &FieldMap) -> usize {
        fields
            .keys()
            .filter(|key| !self.ignored.iter().any(|ignored| ignored == *key))
            .count()
    }

    pub fn accepts(&self, fields: &FieldMap) -> bool {
        self.counted_fields(fields) >= self.min_fields
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_fields: 2,
            ignored: vec![IMAGE_URL_FIELD.to_string()],
        }
    }
}
