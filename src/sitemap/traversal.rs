//! Sitemap traversal: index → leaf sitemaps → page URLs

use crate::crawler::{Expect, Transport};
use crate::sitemap::parser::parse_sitemap;
use crate::url::select_product_urls;
use crate::HarvestError;

/// How many levels of nested indexes a leaf position may descend through
pub const MAX_NESTED_DEPTH: usize = 3;

/// Loads sitemap documents through the shared transport
pub struct SitemapTraversal<'a> {
    transport: &'a Transport,
}

impl<'a> SitemapTraversal<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Loads the sitemap index and returns its leaf-sitemap locations in order
    ///
    /// Any failure here means the run has no usable index and is reported as
    /// `HarvestError::IndexUnavailable`.
    pub async fn load_index(&self, url: &str) -> Result<Vec<String>, HarvestError> {
        let body = self
            .transport
            .fetch_text(url, Expect::Xml)
            .await
            .map_err(|e| HarvestError::IndexUnavailable {
                url: url.to_string(),
                cause: match e {
                    HarvestError::Fetch { cause, .. } => cause,
                    other => other.to_string(),
                },
            })?;

        let doc = parse_sitemap(&body).map_err(|e| HarvestError::IndexUnavailable {
            url: url.to_string(),
            cause: e.to_string(),
        })?;

        if !doc.is_index() {
            tracing::warn!(
                url,
                "Sitemap index has no <sitemap> entries; treating all {} <loc> entries as sitemap locations",
                doc.locs.len()
            );
        }

        let entries = doc.index_entries();
        tracing::info!(url, "Found {} sitemaps in index", entries.len());
        Ok(entries)
    }

    /// Loads a leaf sitemap and returns its page URLs
    ///
    /// A document in leaf position that turns out to be an index is descended
    /// into (up to `MAX_NESTED_DEPTH` levels), children in document order.
    /// The leaf's own parse decides this, so a location listed by the run's
    /// index is never treated as a partition entry, only expanded in place.
    /// Failing children are logged and skipped. The product filter and the
    /// cap apply to the combined list.
    ///
    /// # Arguments
    ///
    /// * `url` - Leaf sitemap location
    /// * `filter` - Product path allow-list, `None` to keep every URL
    /// * `cap` - Maximum URLs returned, `0` for unbounded
    pub async fn load_leaf(
        &self,
        url: &str,
        filter: Option<&[String]>,
        cap: usize,
    ) -> Result<Vec<String>, HarvestError> {
        let mut pages = Vec::new();
        // Depth-first, children pushed in reverse so they pop in document order
        let mut pending: Vec<(String, usize)> = vec![(url.to_string(), 0)];
        let mut first = true;

        while let Some((location, depth)) = pending.pop() {
            let loaded = self.load_document(&location).await;

            let doc = match loaded {
                Ok(doc) => doc,
                Err(e) if first => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %location, "Skipping nested sitemap: {}", e);
                    continue;
                }
            };
            first = false;

            if doc.is_index() {
                if depth >= MAX_NESTED_DEPTH {
                    tracing::warn!(
                        url = %location,
                        "Nested sitemap index deeper than {} levels ignored",
                        MAX_NESTED_DEPTH
                    );
                    continue;
                }
                tracing::debug!(url = %location, "Descending into {} nested sitemaps", doc.sitemaps.len());
                for child in doc.sitemaps.into_iter().rev() {
                    pending.push((child, depth + 1));
                }
                continue;
            }

            if doc.is_ambiguous() {
                tracing::warn!(url = %location, "Sitemap has no <url> entries; using all <loc> entries");
            }
            pages.extend(doc.page_entries());
        }

        let total = pages.len();
        let selected = select_product_urls(pages, filter, cap);
        tracing::info!(url, "Sitemap lists {} URLs, {} selected", total, selected.len());
        Ok(selected)
    }

    async fn load_document(&self, url: &str) -> Result<crate::sitemap::SitemapDocument, HarvestError> {
        let body = self.transport.fetch_text(url, Expect::Xml).await?;
        parse_sitemap(&body).map_err(|source| HarvestError::Sitemap {
            url: url.to_string(),
            source,
        })
    }
}
