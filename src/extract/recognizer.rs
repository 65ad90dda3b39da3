//! Site-specific field recognition
//!
//! The crawl core never hard-codes field names. Everything that depends on the
//! target site's vocabulary (raw field codes in the embedded state, the labels
//! printed in the DOM, the section headers that introduce them) sits behind
//! the `FieldRecognizer` trait.

/// Maps site-specific field codes and labels onto canonical field names
pub trait FieldRecognizer: Send + Sync {
    /// Canonical name for a raw field code; unknown codes pass through verbatim
    fn canonical_key(&self, code: &str) -> String;

    /// Canonical name for a label printed on the page; unknown labels pass through
    fn canonical_label(&self, label: &str) -> String;

    /// Headers introducing the item description section
    fn section_headers(&self) -> &[&str];

    /// Labels recognized inside the description section
    fn section_labels(&self) -> &[&str];

    /// Canonical fields with every label alias that may introduce them
    fn label_aliases(&self) -> &[(&str, &[&str])];
}

/// Raw CONTENTdm field codes and their canonical names
const CONTENTDM_CODES: &[(&str, &str)] = &[
    ("title", "Title"),
    ("titlea", "Title (Arabic)"),
    ("creato", "Creator"),
    ("creata", "Creator (Arabic)"),
    ("publis", "Publisher"),
    ("date", "Date"),
    ("notes", "Notes"),
    ("covera", "Location"),
    ("descri", "Description"),
    ("subjec", "Subject"),
    ("type", "Type"),
    ("audien", "Genre (AAT)"),
    ("langua", "Language"),
    ("contri", "Collection"),
    ("source", "Source"),
    ("rights", "Rights"),
    ("format", "Call number"),
    ("relati", "Link to catalogue"),
];

const SECTION_HEADERS: &[&str] = &["Item Description", "Object Description"];

const SECTION_LABELS: &[&str] = &[
    "Title (English)",
    "Title (Arabic)",
    "Title",
    "Creator (English)",
    "Creator (Arabic)",
    "Creator",
    "Date",
    "Description",
    "Location",
    "Governorate",
    "Country",
    "Subject",
    "Keywords",
    "Medium",
    "Type",
    "Collection",
    "Source",
    "Rights",
    "Call number",
    "Language",
    "Publisher",
    "Notes",
];

const LABEL_ALIASES: &[(&str, &[&str])] = &[
    ("Title", &["Title"]),
    ("Creator", &["Creator", "Author"]),
    ("Date", &["Date", "Year"]),
    ("Subject", &["Subject", "Topic"]),
    ("Type", &["Type", "Format"]),
    ("Language", &["Language"]),
    ("Publisher", &["Publisher"]),
    ("Source", &["Source"]),
    ("Collection", &["Collection"]),
    ("Rights", &["Rights", "Copyright"]),
    ("Call number", &["Call number", "Identifier"]),
    ("Link to catalogue", &["Link to catalogue", "Catalogue"]),
];

/// Recognizer for CONTENTdm-hosted collections such as the AUC digital library
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDmRecognizer;

impl FieldRecognizer for ContentDmRecognizer {
    fn canonical_key(&self, code: &str) -> String {
        CONTENTDM_CODES
            .iter()
            .find(|(raw, _)| *raw == code)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or_else(|| code.to_string())
    }

    fn canonical_label(&self, label: &str) -> String {
        let label = label.trim().trim_end_matches(':').trim();

        if let Some(known) = SECTION_LABELS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(label))
        {
            return known.to_string();
        }

        LABEL_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| alias.eq_ignore_ascii_case(label)))
            .map(|(canonical, _)| canonical.to_string())
            .unwrap_or_else(|| label.to_string())
    }

    fn section_headers(&self) -> &[&str] {
        SECTION_HEADERS
    }

    fn section_labels(&self) -> &[&str] {
        SECTION_LABELS
    }

    fn label_aliases(&self) -> &[(&str, &[&str])] {
        LABEL_ALIASES
    }
}
