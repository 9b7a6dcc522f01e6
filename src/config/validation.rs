use crate::config::types::Tuning;
use crate::ConfigError;
use url::Url;

/// Validates the tuning configuration
pub fn validate(tuning: &Tuning) -> Result<(), ConfigError> {
    if tuning.fetch.concurrency < 1 || tuning.fetch.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "fetch.concurrency must be between 1 and 64, got {}",
            tuning.fetch.concurrency
        )));
    }

    if tuning.fetch.browser_concurrency < 1
        || tuning.fetch.browser_concurrency > tuning.fetch.concurrency
    {
        return Err(ConfigError::Validation(format!(
            "fetch.browser-concurrency must be between 1 and fetch.concurrency ({}), got {}",
            tuning.fetch.concurrency, tuning.fetch.browser_concurrency
        )));
    }

    if tuning.fetch.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch.timeout-secs must be >= 1".to_string(),
        ));
    }

    if tuning.user_agent.archiver_name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.archiver-name cannot be empty".to_string(),
        ));
    }

    if !tuning
        .user_agent
        .archiver_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent.archiver-name must contain only alphanumeric characters and hyphens, got '{}'",
            tuning.user_agent.archiver_name
        )));
    }

    if !tuning.user_agent.contact_url.is_empty() {
        Url::parse(&tuning.user_agent.contact_url).map_err(|e| {
            ConfigError::Validation(format!("Invalid user-agent.contact-url: {}", e))
        })?;
    }

    Ok(())
}
