//! Shelf-Sweep: a partitioned product-catalog harvester
//!
//! This crate walks a storefront's sitemap hierarchy, fetches product pages
//! through a retrying transport that copes with bot-detection layers, extracts
//! a normalized product/variant record through an ordered chain of strategies,
//! and writes one CSV row per variant.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod sitemap;
pub mod url;

use thiserror::Error;

/// Main error type for Shelf-Sweep operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url}: {cause}")]
    Fetch { url: String, cause: String },

    #[error("Sitemap index unavailable at {url}: {cause}")]
    IndexUnavailable { url: String, cause: String },

    #[error("Sitemap error for {url}: {source}")]
    Sitemap { url: String, source: SitemapError },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Sitemap document errors
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Empty sitemap document")]
    Empty,
}

/// Result type alias for Shelf-Sweep operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{ProductRecord, VariantRecord};
pub use sitemap::{Partition, SitemapNode};
