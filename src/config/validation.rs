use crate::config::types::{Config, FetcherConfig, OutputConfig, OutputFormat, SchedulerConfig};
use crate::ConfigError;

/// Validates the entire configuration
///
/// Runs before any request is made; a failure here aborts the crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scope(config)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the seed URL and compiles the scope patterns
fn validate_scope(config: &Config) -> Result<(), ConfigError> {
    let seed = config
        .start_url()
        .ok_or_else(|| ConfigError::Validation("start-url is required".to_string()))?;

    let url = url::Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start-url '{}' must use the http or https scheme",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "start-url '{}' has no host",
            seed
        )));
    }

    config.scope_filter().map(|_| ())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.user_agent.chars().any(char::is_control) {
        return Err(ConfigError::Validation(format!(
            "user-agent must not contain control characters, got {:?}",
            config.user_agent
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if config.connect_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout must be >= 1s, got {}s",
            config.connect_timeout
        )));
    }

    if config.max_redirects > 100 {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be <= 100, got {}",
            config.max_redirects
        )));
    }

    if config.retry_times > 10 {
        return Err(ConfigError::Validation(format!(
            "retry-times must be <= 10, got {}",
            config.retry_times
        )));
    }

    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    // max_depth and max_url_length use 0 for "unlimited", so any value is valid

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if config.format == OutputFormat::Sqlite && config.path == "-" {
        return Err(ConfigError::Validation(
            "sqlite output needs a file path, not stdout".to_string(),
        ));
    }

    Ok(())
}
