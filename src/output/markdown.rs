//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a finished
//! run: run metadata, outcome counts, field coverage and the failure list.

use crate::output::stats::RunStatistics;
use crate::state::CrawlSession;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failures listed individually before the list is cut short
const MAX_LISTED_FAILURES: usize = 50;

/// Writes the markdown summary of `session` to `output_path`
pub fn generate_markdown_summary(
    session: &CrawlSession,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_markdown_summary(session);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a finished session as markdown
pub fn format_markdown_summary(session: &CrawlSession) -> String {
    let stats = RunStatistics::from_session(session);
    let mut md = String::new();

    md.push_str("# Catalog Harvest Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Mode**: {}\n", session.mode));
    md.push_str(&format!(
        "- **Started**: {}\n",
        session.started_at.to_rfc3339()
    ));
    if let Some(finished) = session.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
        let seconds = (finished - session.started_at).num_seconds();
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            seconds,
            seconds as f64 / 60.0
        ));
    }
    if let Some(cap) = session.per_page_cap {
        md.push_str(&format!("- **Per-page cap**: {}\n", cap));
    }
    md.push_str(&format!(
        "- **Retry policy**: {} retries, {:?} delay\n\n",
        session.retry_policy.max_retries, session.retry_policy.retry_delay
    ));

    md.push_str("## Outcome\n\n");
    md.push_str(&format!("- **Records**: {}\n", stats.total_records));
    if let Some((first, last)) = stats.id_range {
        md.push_str(&format!("- **IDs**: {} to {}\n", first, last));
    }
    md.push_str(&format!("- **Failures**: {}\n", stats.total_failures));
    md.push_str(&format!(
        "- **Records with image**: {}\n",
        stats.records_with_image
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    if !session.pages().is_empty() {
        md.push_str("## Pages\n\n");
        md.push_str("| Page | Links |\n");
        md.push_str("|------|-------|\n");
        for page in session.pages() {
            md.push_str(&format!("| {} | {} |\n", page.page, page.links));
        }
        md.push('\n');
    }

    if !stats.field_coverage.is_empty() {
        md.push_str("## Field Coverage\n\n");
        md.push_str("| Field | Records | Coverage |\n");
        md.push_str("|-------|---------|----------|\n");
        for (field, count) in &stats.field_coverage {
            md.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                field,
                count,
                stats.coverage_percent(*count)
            ));
        }
        md.push('\n');
    }

    if !session.failures().is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Attempts | Last Error |\n");
        md.push_str("|-----|----------|------------|\n");
        for failure in session.failures().iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failure.url,
                failure.attempts,
                failure.last_error.as_deref().unwrap_or("-")
            ));
        }
        if session.failures().len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                session.failures().len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}
