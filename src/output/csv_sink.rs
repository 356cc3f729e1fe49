//! CSV record sink
//!
//! Writes the fixed 19-column layout, one row per variant, with a header row
//! before anything else. Every partition writes the same schema so outputs
//! can be concatenated downstream.

use crate::extract::ProductRecord;
use crate::output::traits::RecordSink;
use crate::url::variant_url;
use crate::HarvestError;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Output columns in order
pub const COLUMNS: [&str; 19] = [
    "product_id",
    "product_title",
    "vendor",
    "type",
    "handle",
    "variant_id",
    "variant_title",
    "sku",
    "barcode",
    "option_1_name",
    "option_1_value",
    "option_2_name",
    "option_2_value",
    "option_3_name",
    "option_3_value",
    "variant_price",
    "available",
    "variant_url",
    "image_url",
];

/// Sink writing product rows as CSV
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    seen: HashSet<String>,
    rows_written: u64,
}

impl CsvSink<File> {
    /// Creates (or truncates) the output file, creating parent directories
    pub fn create(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        tracing::info!("Writing rows to {}", path.display());
        Self::new(file)
    }
}

impl<W: Write> CsvSink<W> {
    /// Wraps a writer and writes the header row
    pub fn new(inner: W) -> Result<Self, HarvestError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(COLUMNS)?;
        writer.flush()?;

        Ok(Self {
            writer,
            seen: HashSet::new(),
            rows_written: 0,
        })
    }

    /// Data rows written so far, header excluded
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Number of distinct pages emitted
    pub fn pages_emitted(&self) -> usize {
        self.seen.len()
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> Result<W, HarvestError> {
        self.writer
            .into_inner()
            .map_err(|e| HarvestError::Io(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn emit(&mut self, page_url: &str, record: ProductRecord) -> Result<usize, HarvestError> {
        if self.seen.contains(page_url) {
            tracing::debug!(url = page_url, "Already emitted, skipping");
            return Ok(0);
        }

        if !record.has_variants() {
            tracing::debug!(url = page_url, "Product has no variants, nothing to write");
            return Ok(0);
        }

        self.seen.insert(page_url.to_string());

        let rows = product_rows(page_url, &record);
        for row in &rows {
            self.writer.write_record(row)?;
        }
        self.writer.flush()?;

        self.rows_written += rows.len() as u64;
        Ok(rows.len())
    }

    fn is_seen(&self, page_url: &str) -> bool {
        self.seen.contains(page_url)
    }

    fn flush(&mut self) -> Result<(), HarvestError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Flattens a product into one row per variant, in `COLUMNS` order
pub fn product_rows(page_url: &str, record: &ProductRecord) -> Vec<[String; 19]> {
    record
        .variants
        .iter()
        .map(|variant| {
            [
                record.id.clone(),
                record.title.clone(),
                record.vendor.clone(),
                record.product_type.clone(),
                record.handle.clone(),
                variant.id.clone(),
                variant.title.clone(),
                variant.sku.clone(),
                variant.barcode.clone(),
                record.option_name(0).to_string(),
                variant.option1.clone(),
                record.option_name(1).to_string(),
                variant.option2.clone(),
                record.option_name(2).to_string(),
                variant.option3.clone(),
                variant.price.clone(),
                if variant.available { "1" } else { "0" }.to_string(),
                variant_url(page_url, &variant.id),
                record.featured_image.clone(),
            ]
        })
        .collect()
}
