//! Run statistics
//!
//! Counters collected by the crawl loop and printed when the run ends.

use crate::extract::ExtractionSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Counters for one run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Leaf sitemaps listed by the index
    pub sitemaps_in_index: u64,

    /// Leaf sitemaps inside this run's partition
    pub sitemaps_in_partition: u64,

    pub sitemaps_processed: u64,
    pub sitemaps_failed: u64,

    /// Page URLs selected from the processed sitemaps
    pub pages_listed: u64,

    /// Pages skipped because they were already emitted
    pub pages_skipped_seen: u64,

    pub products_emitted: u64,
    pub rows_written: u64,

    /// Pages where every extraction strategy missed
    pub extraction_failures: u64,

    /// Successful extractions by strategy
    pub by_source: HashMap<ExtractionSource, u64>,

    /// Whether the run stopped on a shutdown signal
    pub cancelled: bool,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            sitemaps_in_index: 0,
            sitemaps_in_partition: 0,
            sitemaps_processed: 0,
            sitemaps_failed: 0,
            pages_listed: 0,
            pages_skipped_seen: 0,
            products_emitted: 0,
            rows_written: 0,
            extraction_failures: 0,
            by_source: HashMap::new(),
            cancelled: false,
        }
    }

    pub fn record_extraction(&mut self, source: ExtractionSource) {
        *self.by_source.entry(source).or_insert(0) += 1;
    }

    /// Pages that went through extraction, successful or not
    pub fn pages_attempted(&self) -> u64 {
        self.by_source.values().sum::<u64>() + self.extraction_failures
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStats) {
    println!("=== Run Statistics ===\n");

    println!("Run:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    if let Some(finished) = stats.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(seconds) = stats.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    if stats.cancelled {
        println!("  Status: cancelled (partial output)");
    }
    println!();

    println!("Sitemaps:");
    println!("  In index: {}", stats.sitemaps_in_index);
    println!("  In partition: {}", stats.sitemaps_in_partition);
    println!("  Processed: {}", stats.sitemaps_processed);
    println!("  Failed: {}", stats.sitemaps_failed);
    println!();

    println!("Pages:");
    println!("  Listed: {}", stats.pages_listed);
    println!("  Skipped (already emitted): {}", stats.pages_skipped_seen);
    println!("  Extraction failures: {}", stats.extraction_failures);
    println!();

    println!("Extraction by Strategy:");
    let mut sources: Vec<_> = stats.by_source.iter().collect();
    sources.sort_by(|a, b| b.1.cmp(a.1));
    for (source, count) in sources {
        println!("  {}: {}", source, count);
    }
    println!();

    let attempted = stats.pages_attempted();
    let success_rate = if attempted > 0 {
        (stats.products_emitted as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Output: {} products, {} rows ({:.1}% of {} attempted pages)",
        stats.products_emitted, stats.rows_written, success_rate, attempted
    );
}
