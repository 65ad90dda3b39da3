//! Label pattern matching over the visible page text

use crate::extract::document::DetailPage;
use crate::extract::recognizer::FieldRecognizer;
use crate::extract::ExtractionStrategy;
use crate::state::FieldMap;

/// Maximum number of lines taken as one value
const MAX_VALUE_LINES: usize = 3;

/// How far below a section header a free-text description may start
const DESCRIPTION_WINDOW: usize = 4;

/// Shorter lines are never taken as a description
const MIN_DESCRIPTION_CHARS: usize = 10;

const DESCRIPTION_FIELD: &str = "Description";

/// Scans every visible line for known labels and takes the lines after them
#[derive(Debug, Default)]
pub struct PatternMatchExtractor;

impl ExtractionStrategy for PatternMatchExtractor {
    fn name(&self) -> &'static str {
        "pattern-match"
    }

    fn extract(&self, page: &DetailPage, recognizer: &dyn FieldRecognizer) -> FieldMap {
        let lines = page.lines();
        let aliases = recognizer.label_aliases();
        let mut fields = FieldMap::new();

        for (canonical, labels) in aliases {
            if let Some(value) = find_value(lines, labels, aliases) {
                fields.insert(canonical.to_string(), value);
            }
        }

        if !fields.contains_key(DESCRIPTION_FIELD) {
            if let Some(description) =
                description_after_header(lines, recognizer.section_headers(), aliases)
            {
                fields.insert(DESCRIPTION_FIELD.to_string(), description);
            }
        }

        fields
    }
}

fn find_value(lines: &[String], labels: &[&str], aliases: &[(&str, &[&str])]) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let Some(inline) = match_label(line, labels) else {
            continue;
        };
        if let Some(inline) = inline {
            return Some(inline);
        }

        let values: Vec<&str> = lines[i + 1..]
            .iter()
            .take(MAX_VALUE_LINES)
            .take_while(|next| !is_label_like(next, aliases))
            .map(String::as_str)
            .collect();
        if !values.is_empty() {
            return Some(values.join(" "));
        }
    }
    None
}

/// Matches `Label`, `Label:` or `Label: value` against any of `labels`
///
/// Returns `Some(Some(value))` for the inline form and `Some(None)` when the
/// value must be read from the following lines.
fn match_label(line: &str, labels: &[&str]) -> Option<Option<String>> {
    for label in labels {
        let Some(rest) = line
            .get(..label.len())
            .filter(|head| head.eq_ignore_ascii_case(label))
            .map(|_| &line[label.len()..])
        else {
            continue;
        };

        if rest.is_empty() || rest == ":" {
            return Some(None);
        }
        if let Some(value) = rest.strip_prefix(':').map(str::trim) {
            if !value.is_empty() {
                return Some(Some(value.to_string()));
            }
        }
    }
    None
}

fn is_label_like(line: &str, aliases: &[(&str, &[&str])]) -> bool {
    if line.ends_with(':') {
        return true;
    }
    aliases
        .iter()
        .flat_map(|(_, labels)| labels.iter())
        .any(|label| label.eq_ignore_ascii_case(line))
}

/// First substantial, non-label line just below a description header
fn description_after_header(
    lines: &[String],
    headers: &[&str],
    aliases: &[(&str, &[&str])],
) -> Option<String> {
    for header in headers {
        let phrase = header.to_lowercase();
        let Some(position) = lines
            .iter()
            .position(|line| line.to_lowercase().contains(&phrase))
        else {
            continue;
        };

        let candidate = lines[position + 1..]
            .iter()
            .take(DESCRIPTION_WINDOW)
            .find(|line| {
                line.chars().count() > MIN_DESCRIPTION_CHARS && !is_label_like(line, aliases)
            });
        if let Some(candidate) = candidate {
            return Some(candidate.clone());
        }
    }
    None
}
