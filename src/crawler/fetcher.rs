//! Resilient HTTP transport
//!
//! This module handles every HTTP request the harvester makes, including:
//! - Building the primary client and the browser-profile client
//! - Classifying responses as success, soft block, transient or hard failure
//! - Retrying with exponential backoff through an injectable sleeper
//! - Escalating to the browser-profile strategy after a soft block, and
//!   preferring it for the rest of the run once it has worked
//! - Sharing one politeness rate limiter across all callers

use crate::config::TransportConfig;
use crate::crawler::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::HarvestError;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Case-insensitive body markers of an anti-bot interstitial
const CHALLENGE_MARKERS: &[&str] = &[
    "checking your browser",
    "enable javascript and cookies",
    "cf-browser-verification",
    "cf_chl_opt",
    "attention required! | cloudflare",
    "<title>just a moment...</title>",
];

/// Header names whose presence identifies an anti-bot vendor
const VENDOR_HEADERS: &[&str] = &["cf-ray", "cf-mitigated", "x-datadome", "x-sucuri-id", "x-iinfo"];

/// `Server` header values that identify an anti-bot vendor
const VENDOR_SERVERS: &[&str] = &["cloudflare", "datadome", "sucuri", "incapsula"];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Which client profile made a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain client with a minimal header set
    Primary,
    /// Client presenting a full desktop-browser header profile with a cookie jar
    Browser,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Primary => write!(f, "primary"),
            Strategy::Browser => write!(f, "browser"),
        }
    }
}

/// What kind of body the caller expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Html,
    Xml,
    Json,
}

/// Final status of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body of a successful response
    Ok(String),
    /// Retries exhausted while the site kept answering with anti-bot responses
    SoftBlocked(String),
    /// Retries exhausted on transient errors, or a non-retryable status
    HardFailure(String),
}

/// Result of a fetch operation
///
/// Callers treat `SoftBlocked` and `HardFailure` alike: the resource is
/// skipped. The distinction only feeds logs and statistics.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub outcome: FetchOutcome,

    /// Number of HTTP attempts made, first included
    pub attempts: u32,

    /// Strategy used by the last attempt
    pub strategy: Strategy,
}

impl FetchResult {
    /// Returns the body, or `None` for anything but success
    pub fn into_body(self) -> Option<String> {
        match self.outcome {
            FetchOutcome::Ok(body) => Some(body),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Ok(_))
    }
}

/// Classification of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Success(String),
    SoftBlock(String),
    Transient(String),
    Fatal(String),
}

/// Classifies one HTTP response
///
/// # Classification Order
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 403 / 429 / 503 | SoftBlock |
/// | Vendor header present (only when `check_vendor`) | SoftBlock |
/// | Other 4xx, unfollowed 3xx | Fatal |
/// | Other 5xx | Transient |
/// | Challenge marker in body | SoftBlock |
/// | Body does not match `expect` | SoftBlock |
/// | Otherwise | Success |
///
/// `check_vendor` is only set for the primary strategy while escalation is
/// possible and another attempt remains: a vendor header is a reason to
/// switch profiles, not a failure in itself.
pub fn classify_response(
    status: u16,
    headers: &HeaderMap,
    body: String,
    expect: Expect,
    check_vendor: bool,
) -> Attempt {
    if matches!(status, 403 | 429 | 503) {
        return Attempt::SoftBlock(format!("HTTP {}", status));
    }

    if check_vendor {
        if let Some(vendor) = detect_vendor(headers) {
            return Attempt::SoftBlock(format!("anti-bot vendor detected ({})", vendor));
        }
    }

    match status {
        200..=299 => {}
        500..=599 => return Attempt::Transient(format!("HTTP {}", status)),
        _ => return Attempt::Fatal(format!("HTTP {}", status)),
    }

    let lowered = body.to_lowercase();
    if let Some(marker) = CHALLENGE_MARKERS.iter().find(|m| lowered.contains(*m)) {
        return Attempt::SoftBlock(format!("challenge page ({})", marker));
    }

    if let Some(reason) = body_mismatch(&body, expect) {
        return Attempt::SoftBlock(reason);
    }

    Attempt::Success(body)
}

/// Returns the vendor signal found in the response headers, if any
fn detect_vendor(headers: &HeaderMap) -> Option<String> {
    if let Some(name) = VENDOR_HEADERS.iter().find(|h| headers.contains_key(**h)) {
        return Some((*name).to_string());
    }

    let server = headers
        .get(header::SERVER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    VENDOR_SERVERS
        .iter()
        .find(|v| server.contains(*v))
        .map(|v| format!("server: {}", v))
}

/// Explains why a body does not look like the expected format
fn body_mismatch(body: &str, expect: Expect) -> Option<String> {
    let trimmed = body.trim_start();
    let head: String = trimmed.chars().take(15).collect::<String>().to_lowercase();
    let looks_html = head.starts_with("<!doctype html") || head.starts_with("<html");

    match expect {
        Expect::Html => None,
        Expect::Xml => {
            if !trimmed.starts_with('<') {
                Some("expected XML, body is not markup".to_string())
            } else if looks_html {
                Some("expected XML, got HTML".to_string())
            } else {
                None
            }
        }
        Expect::Json => {
            if looks_html {
                Some("expected JSON, got HTML".to_string())
            } else if serde_json::from_str::<Value>(trimmed).is_err() {
                Some("expected JSON, body does not parse".to_string())
            } else {
                None
            }
        }
    }
}

/// Classifies a transport-level error
fn classify_error(error: &reqwest::Error) -> Attempt {
    if error.is_builder() {
        Attempt::Fatal(format!("invalid request: {}", error))
    } else if error.is_timeout() {
        Attempt::Transient("request timeout".to_string())
    } else if error.is_connect() {
        Attempt::Transient(format!("connection failed: {}", error))
    } else if error.is_redirect() {
        Attempt::Fatal(format!("redirect error: {}", error))
    } else {
        Attempt::Transient(error.to_string())
    }
}

/// Builds the primary HTTP client
///
/// # Arguments
///
/// * `config` - The transport configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/xml,text/xml;q=0.9,*/*;q=0.8"),
    );

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the browser-profile client
///
/// Presents the header set a desktop Chrome sends on a top-level navigation
/// and keeps cookies, so clearance cookies issued by a challenge survive
/// between requests.
pub fn build_browser_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retrying, escalating HTTP transport shared by the whole run
///
/// Holds no per-resource state between calls. The only state carried across
/// calls is the connection pools, the shared rate limiter and the sticky
/// preference for the browser strategy.
pub struct Transport {
    primary: Client,
    browser: Client,
    policy: BackoffPolicy,
    max_attempts: u32,
    escalate: bool,
    prefer_browser: AtomicBool,
    limiter: Arc<DefaultDirectRateLimiter>,
    sleeper: Arc<dyn Sleeper>,
}

impl Transport {
    /// Creates a transport from configuration with a real-time sleeper
    pub fn from_config(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            primary: build_http_client(config)?,
            browser: build_browser_client(config)?,
            policy: BackoffPolicy::from_config(config),
            max_attempts: config.max_attempts.max(1),
            escalate: config.escalate,
            prefer_browser: AtomicBool::new(false),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Whether the browser strategy has succeeded and is now preferred
    pub fn prefers_browser(&self) -> bool {
        self.prefer_browser.load(Ordering::Relaxed)
    }

    /// Fetches a URL with retry, backoff and escalation
    ///
    /// # Request Flow
    ///
    /// 1. Start with the browser strategy if it is already preferred, else primary
    /// 2. Each attempt waits on the shared rate limiter
    /// 3. Attempts after the first wait `BackoffPolicy::delay_for(attempt)`
    /// 4. A soft block on the primary strategy switches to the browser
    ///    strategy for the remaining attempts (when escalation is enabled)
    /// 5. Vendor headers only count as a soft block while attempts remain
    /// 6. A browser-strategy success makes that strategy sticky
    /// 7. Fatal classifications end immediately; exhaustion ends in SoftBlocked
    ///    or HardFailure depending on the last attempt
    pub async fn fetch(&self, url: &str, expect: Expect) -> FetchResult {
        let mut use_browser = self.prefers_browser();
        let mut strategy = Strategy::Primary;
        let mut last_cause = String::from("no attempt made");
        let mut last_was_soft = false;
        let mut attempts = 0;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt);
                tracing::debug!(url, attempt, ?delay, "Backing off before retry");
                self.sleeper.sleep(delay).await;
            }

            strategy = if use_browser {
                Strategy::Browser
            } else {
                Strategy::Primary
            };

            self.limiter.until_ready().await;
            attempts += 1;

            tracing::debug!(url, attempt = attempts, %strategy, "GET");

            let check_vendor =
                strategy == Strategy::Primary && self.escalate && attempt + 1 < self.max_attempts;

            match self.fetch_once(url, expect, strategy, check_vendor).await {
                Attempt::Success(body) => {
                    if strategy == Strategy::Browser && !self.prefer_browser.swap(true, Ordering::Relaxed) {
                        tracing::info!(url, "Browser strategy succeeded; preferring it for the rest of the run");
                    }
                    tracing::debug!(url, bytes = body.len(), attempts, "Fetched");
                    return FetchResult {
                        outcome: FetchOutcome::Ok(body),
                        attempts,
                        strategy,
                    };
                }
                Attempt::SoftBlock(reason) => {
                    tracing::warn!(url, attempt = attempts, %strategy, cause = %reason, "Soft block");
                    if strategy == Strategy::Primary && self.escalate {
                        use_browser = true;
                    }
                    last_cause = reason;
                    last_was_soft = true;
                }
                Attempt::Transient(cause) => {
                    tracing::warn!(url, attempt = attempts, %strategy, cause = %cause, "Transient failure");
                    last_cause = cause;
                    last_was_soft = false;
                }
                Attempt::Fatal(cause) => {
                    tracing::debug!(url, cause = %cause, "Non-retryable failure");
                    return FetchResult {
                        outcome: FetchOutcome::HardFailure(cause),
                        attempts,
                        strategy,
                    };
                }
            }
        }

        let cause = format!("gave up after {} attempts: {}", attempts, last_cause);
        let outcome = if last_was_soft {
            FetchOutcome::SoftBlocked(cause)
        } else {
            FetchOutcome::HardFailure(cause)
        };
        FetchResult {
            outcome,
            attempts,
            strategy,
        }
    }

    /// Fetches and parses a JSON document
    ///
    /// Returns `None` when the fetch fails or the body is not JSON; the cause
    /// is logged, the caller only learns that no value is available.
    pub async fn fetch_json(&self, url: &str) -> Option<Value> {
        let result = self.fetch(url, Expect::Json).await;
        match result.outcome {
            FetchOutcome::Ok(body) => match serde_json::from_str(body.trim_start()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(url, "JSON decode error: {}", e);
                    None
                }
            },
            FetchOutcome::SoftBlocked(cause) | FetchOutcome::HardFailure(cause) => {
                tracing::debug!(url, cause = %cause, "JSON endpoint unavailable");
                None
            }
        }
    }

    /// Fetches a body, turning anything but success into `HarvestError::Fetch`
    pub async fn fetch_text(&self, url: &str, expect: Expect) -> Result<String, HarvestError> {
        let result = self.fetch(url, expect).await;
        match result.outcome {
            FetchOutcome::Ok(body) => Ok(body),
            FetchOutcome::SoftBlocked(cause) | FetchOutcome::HardFailure(cause) => {
                Err(HarvestError::Fetch {
                    url: url.to_string(),
                    cause,
                })
            }
        }
    }

    async fn fetch_once(&self, url: &str, expect: Expect, strategy: Strategy, check_vendor: bool) -> Attempt {
        let client = match strategy {
            Strategy::Primary => &self.primary,
            Strategy::Browser => &self.browser,
        };

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Transient(format!("failed to read body: {}", e)),
        };

        classify_response(status, &headers, body, expect, check_vendor)
    }
}
