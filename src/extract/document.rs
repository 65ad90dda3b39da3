//! Parsed detail page shared by every extraction strategy

use scraper::{ElementRef, Html, Node};
use url::Url;

/// Elements whose text is never visible
const HIDDEN_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// A rendered detail page: raw source, parsed DOM, and visible text lines
pub struct DetailPage {
    url: Url,
    source: String,
    document: Html,
    lines: Vec<String>,
}

impl DetailPage {
    /// Parses the rendered source of the page at `url`
    pub fn parse(url: &Url, source: &str) -> Self {
        let document = Html::parse_document(source);
        let lines = text_lines(document.root_element());
        Self {
            url: url.clone(),
            source: source.to_string(),
            document,
            lines,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The raw page source, including inline scripts
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Visible text of the whole page, one trimmed line per entry
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Collects the visible text below `root` as trimmed, non-empty lines
///
/// Every text node contributes its own lines, so adjacent elements never
/// run together.
pub fn text_lines(root: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|element| HIDDEN_TAGS.contains(&element.value().name()));
        if hidden {
            continue;
        }

        for line in text.split('\n') {
            let line = collapse_whitespace(line);
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    lines
}

/// Joins the text of an element into one whitespace-collapsed string
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Trims and collapses internal runs of whitespace to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
