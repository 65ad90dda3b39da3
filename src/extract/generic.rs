//! Last-resort label/value pairs from structural containers

use crate::extract::document::{element_text, DetailPage};
use crate::extract::recognizer::FieldRecognizer;
use crate::extract::ExtractionStrategy;
use crate::state::FieldMap;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

struct Selectors {
    dl: Selector,
    dt: Selector,
    row: Selector,
    cell: Selector,
    label: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        dl: Selector::parse("dl").expect("valid selector"),
        dt: Selector::parse("dt").expect("valid selector"),
        row: Selector::parse("table tr").expect("valid selector"),
        cell: Selector::parse("th, td").expect("valid selector"),
        label: Selector::parse(
            "[class*='field'] .label, [class*='field'] .key, [class*='field'] strong, [class*='field'] b, \
             [class*='row'] .label, [class*='row'] .key, [class*='row'] strong, [class*='row'] b, \
             .metadata-table .label, .metadata-table .key, .metadata-table strong, .metadata-table b",
        )
        .expect("valid selector"),
    })
}

/// Reads definition lists, table rows and labelled field containers
#[derive(Debug, Default)]
pub struct GenericDomExtractor;

impl ExtractionStrategy for GenericDomExtractor {
    fn name(&self) -> &'static str {
        "generic-dom"
    }

    fn extract(&self, page: &DetailPage, recognizer: &dyn FieldRecognizer) -> FieldMap {
        let document = page.document();
        let selectors = selectors();
        let mut fields = FieldMap::new();

        for list in document.select(&selectors.dl) {
            for term in list.select(&selectors.dt) {
                if let Some(definition) = next_element(term, |name| name == "dd") {
                    insert_pair(&mut fields, recognizer, term, definition);
                }
            }
        }

        for row in document.select(&selectors.row) {
            let mut cells = row.select(&selectors.cell);
            if let (Some(label), Some(value)) = (cells.next(), cells.next()) {
                insert_pair(&mut fields, recognizer, label, value);
            }
        }

        for label in document.select(&selectors.label) {
            if let Some(value) = next_element(label, |_| true) {
                insert_pair(&mut fields, recognizer, label, value);
            }
        }

        fields
    }
}

/// Nearest following sibling element accepted by `accept`
///
/// Stops at the first sibling element that is rejected.
fn next_element<'a>(
    element: ElementRef<'a>,
    accept: impl Fn(&str) -> bool,
) -> Option<ElementRef<'a>> {
    let sibling = element.next_siblings().find_map(ElementRef::wrap)?;
    accept(sibling.value().name()).then_some(sibling)
}

fn insert_pair(
    fields: &mut FieldMap,
    recognizer: &dyn FieldRecognizer,
    label: ElementRef<'_>,
    value: ElementRef<'_>,
) {
    let raw_label = element_text(label);
    let raw_label = raw_label.trim_end_matches(':').trim();
    let value = element_text(value);
    if raw_label.is_empty() || value.is_empty() || value.eq_ignore_ascii_case(raw_label) {
        return;
    }

    let key = recognizer.canonical_label(raw_label);
    fields.entry(key).or_insert(value);
}
