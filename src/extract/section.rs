//! "Item Description" section heuristic
//!
//! Detail pages without an embedded state still print their metadata as a
//! labelled block under a description header. The block is located through
//! the header element and its nearest ancestor that also holds the values,
//! then read line by line against the recognizer's label allow-list.

use crate::extract::document::{element_text, text_lines, DetailPage};
use crate::extract::recognizer::FieldRecognizer;
use crate::extract::ExtractionStrategy;
use crate::state::FieldMap;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// Elements that may carry a section header as their whole text
const HEADER_CANDIDATES: &str =
    "h1, h2, h3, h4, h5, h6, header, legend, button, span, div, p, strong, dt, th, label";

fn header_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse(HEADER_CANDIDATES).expect("header selector is valid"))
}

#[derive(Debug, Default)]
pub struct SectionHeuristicExtractor;

impl ExtractionStrategy for SectionHeuristicExtractor {
    fn name(&self) -> &'static str {
        "section-heuristic"
    }

    fn extract(&self, page: &DetailPage, recognizer: &dyn FieldRecognizer) -> FieldMap {
        for header in recognizer.section_headers() {
            if let Some(lines) = section_lines(page, header) {
                let fields = parse_labelled_lines(&lines, recognizer.section_labels());
                if !fields.is_empty() {
                    return fields;
                }
            }
        }
        FieldMap::new()
    }
}

/// Lines following `header` within its section
///
/// Prefers an element whose whole text is the header; if none exists, falls
/// back to the first visible line mentioning the header phrase.
fn section_lines(page: &DetailPage, header: &str) -> Option<Vec<String>> {
    let header_element = page
        .document()
        .select(header_selector())
        .find(|element| is_header_text(&element_text(*element), header));

    if let Some(element) = header_element {
        for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
            let lines = text_lines(ancestor);
            if let Some(after) = lines_after(&lines, |line| is_header_text(line, header)) {
                return Some(after);
            }
        }
    }

    let phrase = header.to_lowercase();
    lines_after(page.lines(), |line| line.to_lowercase().contains(&phrase))
}

fn is_header_text(text: &str, header: &str) -> bool {
    text.trim().trim_end_matches(':').trim().eq_ignore_ascii_case(header)
}

fn lines_after(lines: &[String], is_header: impl Fn(&str) -> bool) -> Option<Vec<String>> {
    let position = lines.iter().position(|line| is_header(line))?;
    let after = &lines[position + 1..];
    (!after.is_empty()).then(|| after.to_vec())
}

/// Reads sequential label/value lines against an allow-list of labels
///
/// A label either stands alone on its line (optionally colon-terminated) or
/// starts an inline `Label: value` line. Value lines accumulate until the
/// next label. Unknown colon-terminated labels close the current value.
pub fn parse_labelled_lines(lines: &[String], labels: &[&str]) -> FieldMap {
    let mut fields = FieldMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in lines {
        match classify(line, labels) {
            Line::Label { label, inline } => {
                commit(&mut fields, current.take());
                let values = inline.into_iter().collect();
                current = Some((label.to_string(), values));
            }
            Line::UnknownLabel => commit(&mut fields, current.take()),
            Line::Value => {
                if let Some((_, values)) = current.as_mut() {
                    values.push(line.clone());
                }
            }
        }
    }
    commit(&mut fields, current);

    fields
}

enum Line<'a> {
    Label { label: &'a str, inline: Option<String> },
    UnknownLabel,
    Value,
}

fn classify<'a>(line: &str, labels: &[&'a str]) -> Line<'a> {
    let bare = line.trim_end_matches(':').trim();
    if let Some(label) = find_label(bare, labels) {
        return Line::Label { label, inline: None };
    }

    if let Some((head, rest)) = line.split_once(':') {
        if let Some(label) = find_label(head.trim(), labels) {
            let rest = rest.trim();
            let inline = (!rest.is_empty()).then(|| rest.to_string());
            return Line::Label { label, inline };
        }
    }

    if line.ends_with(':') {
        Line::UnknownLabel
    } else {
        Line::Value
    }
}

fn find_label<'a>(text: &str, labels: &[&'a str]) -> Option<&'a str> {
    labels
        .iter()
        .copied()
        .find(|label| label.eq_ignore_ascii_case(text))
}

fn commit(fields: &mut FieldMap, current: Option<(String, Vec<String>)>) {
    let Some((label, values)) = current else {
        return;
    };
    if values.is_empty() {
        return;
    }
    fields.entry(label).or_insert_with(|| values.join(" "));
}
