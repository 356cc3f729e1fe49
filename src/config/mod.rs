//! Configuration module for Shelf-Sweep
//!
//! This module handles loading, merging, and validating run configuration.
//! A TOML file supplies the base layer, command line flags (which also read
//! the environment) override it, and the merged result is validated once.
//!
//! # Example
//!
//! ```no_run
//! use shelf_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Processing sitemaps from offset {}", config.partition.offset);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, Overrides, PartitionConfig, SiteConfig,
    TransportConfig, DEFAULT_PRODUCT_PATHS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, resolve_config};
pub use validation::validate;
