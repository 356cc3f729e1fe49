//! The storefront's structured product endpoint (`<page>.json`)

use crate::extract::pipeline::StageOutcome;
use crate::extract::record::ProductRecord;
use serde_json::Value;

/// Reads the product out of an endpoint response body
///
/// The body must hold a `product` object with at least one variant.
pub fn endpoint_product(body: &Value, page_url: &str) -> StageOutcome {
    let Some(product) = body.get("product") else {
        return StageOutcome::Missing("response has no product field");
    };

    StageOutcome::from_record(ProductRecord::from_product_json(product, page_url))
}
