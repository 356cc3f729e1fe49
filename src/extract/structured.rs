//! Schema.org `Product` blocks in `application/ld+json` scripts
//!
//! A JSON-LD product carries no variant list, so it is turned into a
//! one-variant record from the name, brand, sku, first offer and image.

use crate::extract::record::{image_text, json_text, ProductRecord, VariantRecord};
use crate::url::handle_from_url;
use scraper::{Html, Selector};
use serde_json::Value;

/// Finds the first JSON-LD `Product` in a document and converts it
pub fn find_json_ld_product(document: &Html, page_url: &str) -> Option<ProductRecord> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for element in document.select(&selector) {
        let text = element.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let value = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(url = page_url, "Skipping malformed JSON-LD block: {}", e);
                continue;
            }
        };

        if let Some(product) = find_product_node(&value) {
            return Some(product_from_json_ld(product, page_url));
        }
    }

    None
}

/// Locates a `Product` node in a top-level object, array or `@graph`
fn find_product_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product_node),
        Value::Object(map) => {
            if is_product_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph")
                .and_then(Value::as_array)
                .and_then(|graph| graph.iter().find_map(find_product_node))
        }
        _ => None,
    }
}

fn is_product_type(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(t)) => t == "Product",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

/// Converts a JSON-LD `Product` node into a one-variant record
///
/// # Field Mapping
///
/// | Record field | JSON-LD source |
/// |--------------|----------------|
/// | id, sku | `sku`, then `productID`, then the page handle |
/// | title | `name` |
/// | vendor | `brand.name` or `brand` |
/// | product_type | `category` |
/// | featured_image | `image` (string, first of array, or `{url}`) |
/// | price | first offer's `price` |
/// | available | first offer's `availability` ends with `InStock`; true without offers |
pub fn product_from_json_ld(node: &Value, page_url: &str) -> ProductRecord {
    let handle = handle_from_url(page_url);

    let mut id = json_text(node.get("sku"));
    if id.is_empty() {
        id = json_text(node.get("productID"));
    }
    let sku = id.clone();
    if id.is_empty() {
        id = handle.clone();
    }

    let title = json_text(node.get("name"));

    let vendor = match node.get("brand") {
        Some(Value::Object(brand)) => json_text(brand.get("name")),
        other => json_text(other),
    };

    let featured_image = match node.get("image") {
        Some(Value::Array(images)) => images.first().map(image_text).unwrap_or_default(),
        Some(image) => image_text(image),
        None => String::new(),
    };

    let offer = match node.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        _ => None,
    };

    let (price, available) = match offer {
        Some(offer) => (
            json_text(offer.get("price")),
            json_text(offer.get("availability")).ends_with("InStock"),
        ),
        None => (String::new(), true),
    };

    ProductRecord {
        id: id.clone(),
        title: title.clone(),
        vendor,
        product_type: json_text(node.get("category")),
        handle,
        featured_image,
        options: Vec::new(),
        variants: vec![VariantRecord {
            id,
            title,
            sku,
            price,
            available,
            ..VariantRecord::default()
        }],
    }
}
