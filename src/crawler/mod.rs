//! Crawler module for fetching and harvesting product pages
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry, backoff and strategy escalation
//! - The backoff policy and the sleeper it waits through
//! - Overall run coordination

mod backoff;
mod coordinator;
mod fetcher;

pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use coordinator::Coordinator;
pub use fetcher::{
    build_browser_client, build_http_client, classify_response, Attempt, Expect, FetchOutcome, FetchResult,
    Strategy, Transport,
};

use crate::config::{validate, Config};
use crate::output::RunStats;
use crate::HarvestError;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest operation
///
/// This is the main entry point for starting a run. It will:
/// 1. Validate the configuration and build the transport
/// 2. Load the sitemap index and apply the partition
/// 3. Walk the partition's leaf sitemaps
/// 4. Extract each product page and write its rows
/// 5. Return the run statistics
///
/// # Arguments
///
/// * `config` - The merged configuration
/// * `cancel` - Token that stops the run early
///
/// # Returns
///
/// * `Ok(RunStats)` - Run completed or was cancelled
/// * `Err(HarvestError)` - Fatal failure (invalid config, index unavailable,
///   output not writable)
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<RunStats, HarvestError> {
    validate(&config)?;
    let coordinator = Coordinator::new(config)?;
    coordinator.run(cancel).await
}
