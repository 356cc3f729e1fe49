//! Output module for writing harvested products
//!
//! This module handles:
//! - Flattening products into the fixed CSV row layout
//! - In-run dedup of emitted pages
//! - Recording run statistics

mod csv_sink;
pub mod stats;
mod traits;

pub use csv_sink::{product_rows, CsvSink, COLUMNS};
pub use stats::{print_statistics, RunStats};
pub use traits::RecordSink;
