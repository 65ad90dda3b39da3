//! Run statistics
//!
//! This module computes field coverage and outcome counts for a finished
//! session or for a records file loaded back from disk.

use crate::crawler::ValidationReport;
use crate::state::{CrawlSession, EntryRecord, FailureRecord, IMAGE_URL_FIELD};
use indexmap::IndexMap;

/// Outcome counts and field coverage of a set of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub total_records: usize,

    pub total_failures: usize,

    /// Failures that belong to a whole listing page
    pub listing_failures: usize,

    /// Records carrying a resolved image
    pub records_with_image: usize,

    /// Smallest and largest assigned ID
    pub id_range: Option<(u64, u64)>,

    /// Number of records having each field, most common first
    pub field_coverage: Vec<(String, usize)>,
}

impl RunStatistics {
    pub fn from_records(records: &[EntryRecord], failures: &[FailureRecord]) -> Self {
        let mut coverage: IndexMap<String, usize> = IndexMap::new();
        for record in records {
            for key in record.fields.keys() {
                *coverage.entry(key.clone()).or_insert(0) += 1;
            }
        }
        let mut field_coverage: Vec<(String, usize)> = coverage.into_iter().collect();
        // Stable sort keeps first-seen order among equal counts
        field_coverage.sort_by(|a, b| b.1.cmp(&a.1));

        let id_range = records
            .iter()
            .map(|record| record.id)
            .min()
            .zip(records.iter().map(|record| record.id).max());

        Self {
            total_records: records.len(),
            total_failures: failures.len(),
            listing_failures: failures.iter().filter(|f| f.is_listing()).count(),
            records_with_image: records
                .iter()
                .filter(|record| record.get(IMAGE_URL_FIELD).is_some())
                .count(),
            id_range,
            field_coverage,
        }
    }

    pub fn from_session(session: &CrawlSession) -> Self {
        Self::from_records(session.records(), session.failures())
    }

    /// Share of attempted entries that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_records + self.total_failures - self.listing_failures;
        if attempted == 0 {
            return 0.0;
        }
        self.total_records as f64 / attempted as f64 * 100.0
    }

    /// Share of records carrying `field`, in percent
    pub fn coverage_percent(&self, count: usize) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        count as f64 / self.total_records as f64 * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.total_records);
    if let Some((first, last)) = stats.id_range {
        println!("  IDs: {}..={}", first, last);
    }
    println!("  Failures: {}", stats.total_failures);
    if stats.listing_failures > 0 {
        println!("    of which listing pages: {}", stats.listing_failures);
    }
    println!("  Records with image: {}", stats.records_with_image);
    println!("  Success rate: {:.1}%", stats.success_rate());
    println!();

    if !stats.field_coverage.is_empty() {
        println!("Field Coverage:");
        for (field, count) in &stats.field_coverage {
            println!(
                "  {}: {} ({:.1}%)",
                field,
                count,
                stats.coverage_percent(*count)
            );
        }
    }
}

/// Prints the per-page link counts of a validate-only run
pub fn print_validation_report(report: &ValidationReport) {
    println!("=== Page Validation ===\n");
    for page in &report.pages {
        let marker = if page.links > 0 { "ok" } else { "EMPTY" };
        println!("  Page {}: {} link(s) [{}]", page.page, page.links, marker);
    }
    println!();
    println!(
        "Total: {} link(s) across {} page(s), {} page(s) failed",
        report.total_links(),
        report.pages.len(),
        report.failures.len()
    );
}
