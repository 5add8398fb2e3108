use crate::config::parser::{parse_mirrors, parse_proxies};
use crate::config::types::{Config, ProxyLane};
use crate::skip::SkipFilter;
use crate::url::parse_target;
use crate::ConfigError;
use std::time::Duration;

/// Smallest accepted path component limit; shortened names need room for
/// a head, the fingerprint, a tail and an extension
const NAME_MAX_MIN: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_session(config)?;
    validate_workers(config)?;
    validate_timing(config)?;
    validate_targets(&config.target_urls)?;
    parse_mirrors(&config.mirror)?;
    validate_proxies(&config.proxy)?;
    SkipFilter::parse(&config.skip)?;
    Ok(())
}

/// Validates session and mode settings
fn validate_session(config: &Config) -> Result<(), ConfigError> {
    if config.session_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "session_dir cannot be empty".to_string(),
        ));
    }

    if config.session_new && config.target_urls.is_empty() {
        return Err(ConfigError::Validation(
            "a new session needs at least one target".to_string(),
        ));
    }

    if config.index_only && config.download_only {
        return Err(ConfigError::Validation(
            "index_only and download_only are mutually exclusive".to_string(),
        ));
    }

    if config.name_max < NAME_MAX_MIN {
        return Err(ConfigError::Validation(format!(
            "name_max must be >= {}, got {}",
            NAME_MAX_MIN, config.name_max
        )));
    }

    Ok(())
}

/// Validates worker counts
fn validate_workers(config: &Config) -> Result<(), ConfigError> {
    if config.tasks_count < 1 || config.tasks_count > 1000 {
        return Err(ConfigError::Validation(format!(
            "tasks_count must be between 1 and 1000, got {}",
            config.tasks_count
        )));
    }
    Ok(())
}

/// Validates timeout and wait
fn validate_timing(config: &Config) -> Result<(), ConfigError> {
    if !config.timeout.is_finite() || config.timeout <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "timeout must be a positive number of seconds, got {}",
            config.timeout
        )));
    }
    if Duration::try_from_secs_f64(config.timeout).is_err() {
        return Err(ConfigError::Validation(format!(
            "timeout is too large, got {}",
            config.timeout
        )));
    }

    if !config.wait.is_finite() || config.wait < 0.0 {
        return Err(ConfigError::Validation(format!(
            "wait must be >= 0 seconds, got {}",
            config.wait
        )));
    }
    if Duration::try_from_secs_f64(config.wait).is_err() {
        return Err(ConfigError::Validation(format!(
            "wait is too large, got {}",
            config.wait
        )));
    }

    Ok(())
}

/// Validates that every target is an HTTP(S) URL
fn validate_targets(targets: &[String]) -> Result<(), ConfigError> {
    for target in targets {
        parse_target(target)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target '{}': {}", target, e)))?;
    }
    Ok(())
}

/// Validates proxy entries and their worker overrides
pub fn validate_proxies<S: AsRef<str>>(lines: &[S]) -> Result<Vec<ProxyLane>, ConfigError> {
    let lanes = parse_proxies(lines)?;
    for lane in &lanes {
        if lane.tasks_count == Some(0) {
            return Err(ConfigError::Validation(format!(
                "proxy {} must have tasks-count >= 1",
                lane.url
            )));
        }
    }
    Ok(lanes)
}
