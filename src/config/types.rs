use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default allow-list of product-like path segments
pub const DEFAULT_PRODUCT_PATHS: &[&str] = &["/product/", "/products/", "/item/", "/p/", "/shop/"];

/// Main configuration structure for Shelf-Sweep
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Storefront root, e.g. `https://shop.example.com`
    pub base_url: String,

    /// Path (or absolute URL) of the sitemap index
    pub sitemap_path: String,

    /// Whether leaf sitemap URLs are filtered to product-like paths
    pub filter_products: bool,

    /// Path substrings that mark a URL as a product page
    pub product_paths: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            sitemap_path: "/sitemap.xml".to_string(),
            filter_products: true,
            product_paths: DEFAULT_PRODUCT_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Slice of the sitemap index this run is responsible for
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PartitionConfig {
    /// Index of the first leaf sitemap to process
    pub offset: usize,

    /// Number of leaf sitemaps to process (0 = to the end)
    pub count: usize,

    /// Cap on product URLs taken from each leaf (0 = unbounded)
    pub max_urls_per_sitemap: usize,
}

/// Retry, backoff and politeness settings for the transport
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TransportConfig {
    /// Maximum attempts per resource, first attempt included
    pub max_attempts: u32,

    /// Backoff unit; attempt n waits `base * 2^n` plus jitter
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay
    pub backoff_cap_ms: u64,

    /// Upper bound on the random jitter added to each delay
    pub jitter_ms: u64,

    /// Per-attempt request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Allow switching to the browser-profile strategy after a soft block
    pub escalate: bool,

    /// Requests per second shared by all workers
    pub requests_per_second: u32,

    /// User agent for the primary strategy
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 1000,
            backoff_cap_ms: 30_000,
            jitter_ms: 1000,
            timeout_secs: 45,
            connect_timeout_secs: 10,
            escalate: true,
            requests_per_second: 4,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Concurrent page extractions within a leaf sitemap
    pub workers: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory the CSV chunk is written to
    pub directory: PathBuf,

    /// File name prefix; the partition offset is appended
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "products_chunk".to_string(),
        }
    }
}

impl Config {
    /// Parses the configured base URL
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.site.base_url.trim_end_matches('/'))
    }

    /// Resolves the sitemap index location against the base URL
    ///
    /// An absolute `sitemap-path` is used as-is.
    pub fn sitemap_index_url(&self) -> Result<Url, url::ParseError> {
        if let Ok(absolute) = Url::parse(&self.site.sitemap_path) {
            return Ok(absolute);
        }
        let base = self.site.base_url.trim_end_matches('/');
        Url::parse(&format!("{}{}", base, self.site.sitemap_path))
    }

    /// Output file for this partition: `<directory>/<prefix>_<offset>.csv`
    pub fn output_path(&self) -> PathBuf {
        self.output.directory.join(format!(
            "{}_{}.csv",
            self.output.file_prefix, self.partition.offset
        ))
    }

    /// Product path allow-list, or `None` when filtering is disabled
    pub fn product_filter(&self) -> Option<&[String]> {
        if self.site.filter_products {
            Some(&self.site.product_paths)
        } else {
            None
        }
    }
}

/// Values supplied on the command line or through the environment
///
/// Every field is optional; set fields win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub offset: Option<usize>,
    pub count: Option<usize>,
    pub max_urls_per_sitemap: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub no_filter: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.site.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(offset) = self.offset {
            config.partition.offset = offset;
        }
        if let Some(count) = self.count {
            config.partition.count = count;
        }
        if let Some(cap) = self.max_urls_per_sitemap {
            config.partition.max_urls_per_sitemap = cap;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.crawler.workers = workers;
        }
        if self.no_filter {
            config.site.filter_products = false;
        }
    }
}
