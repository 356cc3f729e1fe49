//! Normalized product and variant records

use crate::url::handle_from_url;
use serde_json::Value;

/// Maximum number of product options carried into a row
pub const MAX_OPTIONS: usize = 3;

/// A product as the sink sees it, whatever strategy produced it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    pub vendor: String,
    pub product_type: String,
    pub handle: String,

    /// Image reference, normalized to an absolute URL by the pipeline
    pub featured_image: String,

    /// Option names, at most `MAX_OPTIONS`
    pub options: Vec<String>,

    /// Variants in source order
    pub variants: Vec<VariantRecord>,
}

/// A purchasable unit of a product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantRecord {
    pub id: String,
    pub title: String,
    pub sku: String,
    pub barcode: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,

    /// Raw price text as the source gave it
    pub price: String,
    pub available: bool,
}

impl ProductRecord {
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Name of option `n` (0-based), empty when the product has fewer options
    pub fn option_name(&self, n: usize) -> &str {
        self.options.get(n).map(String::as_str).unwrap_or("")
    }

    /// Builds a record from a storefront product object
    ///
    /// Accepts the shape served by `<page>.json` endpoints and the objects
    /// embedded in page scripts:
    /// - `product_type` or `type`
    /// - options as `{ "name": ... }` objects or bare strings
    /// - featured image from `featured_image`, `image` or the first of `images`
    /// - ids and prices as numbers or strings
    ///
    /// A missing handle is taken from the page URL, and a missing id from the
    /// handle. Returns `None` when `value` is not an object.
    pub fn from_product_json(value: &Value, page_url: &str) -> Option<ProductRecord> {
        let object = value.as_object()?;

        let mut handle = json_text(object.get("handle"));
        if handle.is_empty() {
            handle = handle_from_url(page_url);
        }

        let mut id = json_text(object.get("id"));
        if id.is_empty() {
            id = handle.clone();
        }

        let mut product_type = json_text(object.get("product_type"));
        if product_type.is_empty() {
            product_type = json_text(object.get("type"));
        }

        let options = object
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .map(|option| match option {
                        Value::Object(map) => json_text(map.get("name")),
                        other => json_text(Some(other)),
                    })
                    .take(MAX_OPTIONS)
                    .collect()
            })
            .unwrap_or_default();

        let variants = object
            .get("variants")
            .and_then(Value::as_array)
            .map(|variants| variants.iter().filter_map(VariantRecord::from_json).collect())
            .unwrap_or_default();

        Some(ProductRecord {
            id,
            title: json_text(object.get("title")),
            vendor: json_text(object.get("vendor")),
            product_type,
            handle,
            featured_image: featured_image(object),
            options,
            variants,
        })
    }
}

impl VariantRecord {
    /// Builds a variant from a storefront variant object
    pub fn from_json(value: &Value) -> Option<VariantRecord> {
        let object = value.as_object()?;

        Some(VariantRecord {
            id: json_text(object.get("id")),
            title: json_text(object.get("title")),
            sku: json_text(object.get("sku")),
            barcode: json_text(object.get("barcode")),
            option1: json_text(object.get("option1")),
            option2: json_text(object.get("option2")),
            option3: json_text(object.get("option3")),
            price: json_text(object.get("price")),
            available: json_flag(object.get("available")),
        })
    }
}

/// Renders a scalar JSON value as trimmed text
///
/// Strings are trimmed, numbers and booleans use their JSON spelling, and
/// anything else (missing, null, arrays, objects) is empty.
pub fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Reads an availability flag given as a boolean, a number or a string
fn json_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f > 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Text of an image reference given as a string or as `{ "src" | "url": ... }`
pub(crate) fn image_text(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let src = json_text(map.get("src"));
            if src.is_empty() {
                json_text(map.get("url"))
            } else {
                src
            }
        }
        other => json_text(Some(other)),
    }
}

fn featured_image(object: &serde_json::Map<String, Value>) -> String {
    if let Some(image) = object.get("featured_image") {
        let text = image_text(image);
        if !text.is_empty() {
            return text;
        }
    }

    if let Some(image) = object.get("image") {
        let text = image_text(image);
        if !text.is_empty() {
            return text;
        }
    }

    object
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .map(image_text)
        .unwrap_or_default()
}
