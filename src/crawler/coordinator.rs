//! Crawler coordinator - main harvest orchestration logic
//!
//! This module contains the crawl loop that ties the stages together:
//! - Loading the sitemap index and slicing out this run's partition
//! - Walking each leaf sitemap in order
//! - Extracting products page by page, optionally with bounded concurrency
//! - Emitting rows through the single sink and collecting statistics
//! - Stopping cleanly when the run is cancelled

use crate::config::Config;
use crate::crawler::Transport;
use crate::extract::{Extracted, ExtractionPipeline};
use crate::output::{CsvSink, RecordSink, RunStats};
use crate::sitemap::{Partition, SitemapTraversal};
use crate::HarvestError;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 25;

/// Main harvest coordinator
pub struct Coordinator {
    config: Config,
    transport: Transport,
    base_url: Url,
    index_url: Url,
    partition: Partition,
}

impl Coordinator {
    /// Creates a coordinator with a transport built from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Bad URLs or the HTTP clients could not be built
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let transport = Transport::from_config(&config.transport)?;
        Self::with_transport(config, transport)
    }

    /// Creates a coordinator around an existing transport
    pub fn with_transport(config: Config, transport: Transport) -> Result<Self, HarvestError> {
        let base_url = config.base_url()?;
        let index_url = config.sitemap_index_url()?;
        let partition = Partition::from_config(&config.partition);

        Ok(Self {
            config,
            transport,
            base_url,
            index_url,
            partition,
        })
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    /// Runs the harvest, writing to the configured output file
    ///
    /// The output file is only created once the sitemap index has loaded, so
    /// a run that fails on the index leaves no chunk file behind.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunStats, HarvestError> {
        let mut stats = RunStats::new();
        let Some(leaves) = self.load_index(&mut stats, &cancel).await? else {
            return Ok(self.conclude(stats, true));
        };

        let mut sink = CsvSink::create(&self.config.output_path())?;
        self.harvest(&mut sink, stats, &leaves, &cancel).await
    }

    /// Runs the harvest into `sink`
    ///
    /// # Run Order
    ///
    /// 1. Load the sitemap index; failure here is fatal
    /// 2. Keep only the partition's slice of leaf sitemaps
    /// 3. For each leaf, in order: load its page URLs (a failing leaf is
    ///    skipped), drop pages already emitted, then extract and emit each
    ///    page in sitemap order
    /// 4. Flush the sink
    ///
    /// Cancellation stops the run between steps and while extractions are
    /// in flight; the statistics are still returned, marked as cancelled.
    pub async fn run_with_sink<S: RecordSink>(
        &self,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<RunStats, HarvestError> {
        let mut stats = RunStats::new();
        let Some(leaves) = self.load_index(&mut stats, &cancel).await? else {
            return self.finish(sink, stats, true);
        };

        self.harvest(sink, stats, &leaves, &cancel).await
    }

    /// Loads the index; `None` when cancelled first
    async fn load_index(
        &self,
        stats: &mut RunStats,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<String>>, HarvestError> {
        let traversal = SitemapTraversal::new(&self.transport);

        tracing::info!("Loading sitemap index {}", self.index_url);

        let leaves = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            loaded = traversal.load_index(self.index_url.as_str()) => loaded?,
        };

        stats.sitemaps_in_index = leaves.len() as u64;
        Ok(Some(leaves))
    }

    async fn harvest<S: RecordSink>(
        &self,
        sink: &mut S,
        mut stats: RunStats,
        leaves: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunStats, HarvestError> {
        let traversal = SitemapTraversal::new(&self.transport);
        let pipeline = ExtractionPipeline::new(&self.transport, self.base_url.clone());
        let workers = self.config.crawler.workers.max(1);
        let filter = self.config.product_filter();
        let cap = self.config.partition.max_urls_per_sitemap;

        let slice = self.partition.slice(leaves);
        stats.sitemaps_in_partition = slice.len() as u64;

        tracing::info!(
            "Partition {}: processing {} of {} sitemaps with {} worker(s)",
            self.partition,
            slice.len(),
            leaves.len(),
            workers
        );

        let start_time = Instant::now();
        let mut pages_done: u64 = 0;

        for (position, leaf) in slice.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.finish(sink, stats, true);
            }

            tracing::info!("Sitemap {}/{}: {}", position + 1, slice.len(), leaf);

            let pages = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.finish(sink, stats, true);
                }
                loaded = traversal.load_leaf(leaf, filter, cap) => loaded,
            };

            let pages = match pages {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(url = %leaf, "Skipping sitemap: {}", e);
                    stats.sitemaps_failed += 1;
                    continue;
                }
            };

            stats.sitemaps_processed += 1;
            stats.pages_listed += pages.len() as u64;

            let mut in_leaf = HashSet::new();
            let mut batch = Vec::with_capacity(pages.len());
            for page in pages {
                if sink.is_seen(&page) || !in_leaf.insert(page.clone()) {
                    stats.pages_skipped_seen += 1;
                    continue;
                }
                batch.push(page);
            }

            let pipeline = &pipeline;
            let results = stream::iter(batch.into_iter().map(|page| async move {
                let extracted = pipeline.extract(&page).await;
                (page, extracted)
            }))
            .buffered(workers);
            tokio::pin!(results);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return self.finish(sink, stats, true);
                    }
                    next = results.next() => next,
                };

                let Some((page, extracted)) = next else {
                    break;
                };

                self.record(sink, &mut stats, &page, extracted)?;
                pages_done += 1;

                if pages_done % PROGRESS_INTERVAL == 0 {
                    let rate = pages_done as f64 / start_time.elapsed().as_secs_f64().max(0.001);
                    tracing::info!(
                        "Progress: {} pages, {} products, {} rows, {:.2} pages/sec",
                        pages_done,
                        stats.products_emitted,
                        stats.rows_written,
                        rate
                    );
                }
            }
        }

        self.finish(sink, stats, false)
    }

    fn record<S: RecordSink>(
        &self,
        sink: &mut S,
        stats: &mut RunStats,
        page: &str,
        extracted: Option<Extracted>,
    ) -> Result<(), HarvestError> {
        let Some(extracted) = extracted else {
            stats.extraction_failures += 1;
            return Ok(());
        };

        stats.record_extraction(extracted.source);
        let rows = sink.emit(page, extracted.record)?;
        if rows > 0 {
            stats.products_emitted += 1;
            stats.rows_written += rows as u64;
            tracing::debug!(url = page, rows, source = %extracted.source, "Emitted");
        } else {
            stats.pages_skipped_seen += 1;
        }
        Ok(())
    }

    fn finish<S: RecordSink>(
        &self,
        sink: &mut S,
        stats: RunStats,
        cancelled: bool,
    ) -> Result<RunStats, HarvestError> {
        sink.flush()?;
        Ok(self.conclude(stats, cancelled))
    }

    fn conclude(&self, mut stats: RunStats, cancelled: bool) -> RunStats {
        stats.cancelled = cancelled;
        stats.finish();

        if cancelled {
            tracing::warn!(
                "Run cancelled after {} products; output is partial, rerun the remaining sitemaps with a later offset",
                stats.products_emitted
            );
        } else {
            tracing::info!(
                "Harvest completed: {} products, {} rows from {} sitemaps ({} failed)",
                stats.products_emitted,
                stats.rows_written,
                stats.sitemaps_processed,
                stats.sitemaps_failed
            );
        }

        stats
    }
}
