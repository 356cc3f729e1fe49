//! URL handling module for Shelf-Sweep
//!
//! This module provides product-path matching for leaf sitemap entries and
//! the URL rewrites the pipeline needs: image normalization, the JSON
//! endpoint and per-variant URLs, and handle derivation.

mod matcher;
mod normalize;

pub use matcher::{is_product_url, select_product_urls};
pub use normalize::{handle_from_url, json_endpoint_url, normalize_image_url, variant_url};
