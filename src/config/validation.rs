use crate::config::types::{CrawlConfig, HttpConfig, JobConfig};
use crate::schema::{validate_schema, validate_start_url};
use crate::ConfigError;

/// Validates the entire job, including the schema it describes
pub fn validate(config: &JobConfig) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_http_config(&config.http)?;

    let schema = config.to_schema()?;
    validate_schema(&schema)?;
    validate_start_url(&config.crawl.url, &schema)?;

    // Policies and mode names are checked by their parsers
    config.mode()?;
    config.crawl_options()?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.url.trim().is_empty() {
        return Err(ConfigError::Validation("url cannot be empty".to_string()));
    }

    if config.max_parallel < 1 || config.max_parallel > 100 {
        return Err(ConfigError::Validation(format!(
            "max-parallel must be between 1 and 100, got {}",
            config.max_parallel
        )));
    }

    if config.max_cycles == Some(0) {
        return Err(ConfigError::Validation(
            "max-cycles must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 || config.connect_timeout_secs > config.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be between 1 and timeout-secs ({}), got {}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    for (name, _) in &config.headers {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ConfigError::Validation(format!(
                "invalid header name '{}'",
                name
            )));
        }
    }

    Ok(())
}
