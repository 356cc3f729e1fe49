//! Sitemap module for discovering product pages
//!
//! This module contains:
//! - XML parsing of sitemap indexes and leaf sitemaps
//! - The partition slice a run instance owns
//! - Traversal from the index down to filtered, capped page URL lists

mod parser;
mod partition;
mod traversal;

pub use parser::{parse_sitemap, SitemapDocument, SitemapNode};
pub use partition::Partition;
pub use traversal::{SitemapTraversal, MAX_NESTED_DEPTH};
