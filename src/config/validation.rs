use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_source_config(&config.source, config.crawler.year)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !(1980..=2100).contains(&config.year) {
        return Err(ConfigError::Validation(format!(
            "year must be between 1980 and 2100, got {}",
            config.year
        )));
    }

    Ok(())
}

/// Validates the remote directory configuration
fn validate_source_config(config: &SourceConfig, year: u16) -> Result<(), ConfigError> {
    let index = config.index_url_for(year);
    let url = Url::parse(&index)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index_url '{}': {}", index, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "index_url '{}' must use http or https",
            index
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.encoding.trim().is_empty() {
        return Err(ConfigError::Validation(
            "encoding cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
