use crate::config::types::{
    Config, CrawlerConfig, ExtractConfig, OutputConfig, PriorityConfig, ScopeConfig,
    UserAgentConfig,
};
use crate::url::matches_wildcard;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_scope_config(&config.scope)?;
    validate_extract_config(&config.extract)?;
    validate_priority_config(&config.priority)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    if config.concurrent_tasks < 1 || config.concurrent_tasks > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrent_tasks must be between 1 and 100, got {}",
            config.concurrent_tasks
        )));
    }

    if config.request_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 100ms, got {}ms",
            config.request_timeout
        )));
    }

    if config.max_redirects > 30 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 30, got {}",
            config.max_redirects
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.retry_max_delay < config.retry_base_delay {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay ({}ms) must be >= retry_base_delay ({}ms)",
            config.retry_max_delay, config.retry_base_delay
        )));
    }

    if config.url_limit < 1 {
        return Err(ConfigError::Validation(
            "url_limit must be >= 1".to_string(),
        ));
    }

    if config.max_empty_polls < 1 {
        return Err(ConfigError::Validation(
            "max_empty_polls must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Seeds must parse, use http(s), and fall inside the allowed hosts
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    if config.allowed_hosts.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_hosts must contain at least one host pattern".to_string(),
        ));
    }

    for pattern in config.allowed_hosts.iter().chain(&config.denied_hosts) {
        validate_domain_pattern(pattern)?;
    }

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "seeds must contain at least one URL".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        let host = url.host_str().ok_or_else(|| {
            ConfigError::InvalidUrl(format!("Seed URL '{}' has no host", seed))
        })?;

        if !config
            .allowed_hosts
            .iter()
            .any(|pattern| matches_wildcard(pattern, host))
        {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' is outside allowed_hosts",
                seed
            )));
        }

        if config
            .denied_hosts
            .iter()
            .any(|pattern| matches_wildcard(pattern, host))
        {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' is on a denied host",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.search_string.trim().is_empty() {
        return Err(ConfigError::Validation(
            "search_string cannot be empty".to_string(),
        ));
    }

    Selector::parse(&config.content_selector).map_err(|e| {
        ConfigError::Validation(format!(
            "Invalid content_selector '{}': {:?}",
            config.content_selector, e
        ))
    })?;

    for tag in &config.skip_tags {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "skip_tags entries must be plain tag names, got '{}'",
                tag
            )));
        }
    }

    Ok(())
}

fn validate_priority_config(config: &PriorityConfig) -> Result<(), ConfigError> {
    if config.max_depth_band < 2 {
        return Err(ConfigError::Validation(format!(
            "max_depth_band must be >= 2, got {}",
            config.max_depth_band
        )));
    }

    if config.content_suffixes.iter().any(|s| s.is_empty())
        || config.high_value_paths.iter().any(|s| s.is_empty())
        || config.keywords.iter().any(|s| s.is_empty())
    {
        return Err(ConfigError::Validation(
            "priority lists cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.flush_size < 1 {
        return Err(ConfigError::Validation(
            "flush_size must be >= 1".to_string(),
        ));
    }

    if config.max_flush_failures < 1 {
        return Err(ConfigError::Validation(
            "max_flush_failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a host pattern (supports a leading "*.")
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
