//! Record sink trait
//!
//! The crawl loop hands every extracted product to a `RecordSink`. The sink
//! owns the run's dedup set, so it alone decides whether a page's rows are
//! written.

use crate::extract::ProductRecord;
use crate::HarvestError;

/// Destination for extracted products
pub trait RecordSink {
    /// Writes one row per variant of `record`, found at `page_url`
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Number of rows written; `0` when the page was already
    ///   emitted in this run or the record has no variants
    /// * `Err(HarvestError)` - The underlying writer failed
    fn emit(&mut self, page_url: &str, record: ProductRecord) -> Result<usize, HarvestError>;

    /// Whether rows for `page_url` were already written in this run
    fn is_seen(&self, page_url: &str) -> bool;

    /// Flushes buffered rows to the underlying writer
    fn flush(&mut self) -> Result<(), HarvestError>;
}
