//! Ordered extraction chain
//!
//! For each page the strategies run in a fixed order and the first one that
//! yields a record with at least one variant wins:
//!
//! 1. The structured JSON endpoint (`<page>.json`)
//! 2. A product object assigned in an inline script
//! 3. A JSON-LD `Product` block
//!
//! The HTML page is fetched only when the endpoint stage misses, and at most
//! once for stages 2 and 3 together.

use crate::crawler::{Expect, Transport};
use crate::extract::endpoint::endpoint_product;
use crate::extract::record::ProductRecord;
use crate::extract::script::find_script_product;
use crate::extract::structured::find_json_ld_product;
use crate::url::{json_endpoint_url, normalize_image_url};
use scraper::Html;
use std::fmt;
use url::Url;

/// Which strategy produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionSource {
    Endpoint,
    Script,
    JsonLd,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::Endpoint => write!(f, "endpoint"),
            ExtractionSource::Script => write!(f, "script"),
            ExtractionSource::JsonLd => write!(f, "json-ld"),
        }
    }
}

/// Result of a single stage: a usable record, or why there is none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Found(ProductRecord),
    Missing(&'static str),
}

impl StageOutcome {
    /// Accepts a built record only when it has variants
    pub fn from_record(record: Option<ProductRecord>) -> Self {
        match record {
            Some(record) if record.has_variants() => StageOutcome::Found(record),
            Some(_) => StageOutcome::Missing("product has no variants"),
            None => StageOutcome::Missing("product is not an object"),
        }
    }
}

/// A record and the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub record: ProductRecord,
    pub source: ExtractionSource,
}

/// Runs the extraction chain against pages of one site
pub struct ExtractionPipeline<'a> {
    transport: &'a Transport,
    base_url: Url,
}

impl<'a> ExtractionPipeline<'a> {
    /// Creates a pipeline
    ///
    /// # Arguments
    ///
    /// * `transport` - Shared transport used for every fetch
    /// * `base_url` - Site root that root-relative image paths resolve against
    pub fn new(transport: &'a Transport, base_url: Url) -> Self {
        Self { transport, base_url }
    }

    /// Extracts a product from a page
    ///
    /// Returns `None` when every stage misses or the page cannot be fetched.
    /// Misses are logged, never raised.
    pub async fn extract(&self, page_url: &str) -> Option<Extracted> {
        let endpoint = json_endpoint_url(page_url);
        let outcome = match self.transport.fetch_json(&endpoint).await {
            Some(body) => endpoint_product(&body, page_url),
            None => StageOutcome::Missing("endpoint unavailable"),
        };

        match outcome {
            StageOutcome::Found(record) => return Some(self.finish(record, ExtractionSource::Endpoint)),
            StageOutcome::Missing(reason) => {
                tracing::debug!(url = page_url, cause = reason, "JSON endpoint missed, trying HTML");
            }
        }

        let html = match self.transport.fetch_text(page_url, Expect::Html).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = page_url, "Product page unavailable: {}", e);
                return None;
            }
        };

        match extract_from_html(&html, page_url) {
            Some((record, source)) => Some(self.finish(record, source)),
            None => {
                tracing::warn!(url = page_url, "No product data found");
                None
            }
        }
    }

    fn finish(&self, mut record: ProductRecord, source: ExtractionSource) -> Extracted {
        record.featured_image = normalize_image_url(&record.featured_image, &self.base_url);
        tracing::debug!(
            handle = %record.handle,
            %source,
            variants = record.variants.len(),
            "Product extracted"
        );
        Extracted { record, source }
    }
}

/// Runs the HTML stages (script, then JSON-LD) over one parsed page
pub fn extract_from_html(html: &str, page_url: &str) -> Option<(ProductRecord, ExtractionSource)> {
    let document = Html::parse_document(html);

    let script = find_script_product(&document)
        .map(|found| ProductRecord::from_product_json(&found.value, page_url));
    match StageOutcome::from_record(script.flatten()) {
        StageOutcome::Found(record) => return Some((record, ExtractionSource::Script)),
        StageOutcome::Missing(reason) => {
            tracing::debug!(url = page_url, cause = reason, "Script stage missed");
        }
    }

    match StageOutcome::from_record(find_json_ld_product(&document, page_url)) {
        StageOutcome::Found(record) => Some((record, ExtractionSource::JsonLd)),
        StageOutcome::Missing(reason) => {
            tracing::debug!(url = page_url, cause = reason, "JSON-LD stage missed");
            None
        }
    }
}
