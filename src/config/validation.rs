use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig, TransportConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_transport_config(&config.transport)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the target site: base URL is mandatory
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.base_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "base_url is required (set [site] base-url, --base-url or CURR_URL)".to_string(),
        ));
    }

    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", config.base_url, e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    if !config.sitemap_path.starts_with('/') && Url::parse(&config.sitemap_path).is_err() {
        return Err(ConfigError::Validation(format!(
            "sitemap_path must start with '/' or be an absolute URL, got '{}'",
            config.sitemap_path
        )));
    }

    if config.filter_products {
        if config.product_paths.is_empty() {
            return Err(ConfigError::Validation(
                "product_paths cannot be empty while filter_products is enabled".to_string(),
            ));
        }
        if config.product_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "product_paths cannot contain empty entries".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates retry and politeness settings
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_cap_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_cap_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_cap_ms, config.backoff_base_ms
        )));
    }

    if config.requests_per_second < 1 {
        return Err(ConfigError::Validation(
            "requests_per_second must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.file_prefix.trim().is_empty() {
        return Err(ConfigError::Validation(
            "file_prefix cannot be empty".to_string(),
        ));
    }

    if config.file_prefix.contains('/') || config.file_prefix.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "file_prefix must be a bare file name, got '{}'",
            config.file_prefix
        )));
    }

    Ok(())
}
