use crate::config::types::{Config, ProxyLane};
use crate::config::validation::validate;
use crate::storage::session::parse_list;
use crate::url::MirrorRule;
use crate::ConfigError;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to load or parse the configuration
///
/// The result is not validated yet: command-line options are usually
/// layered on top first. Call [`load_and_validate`] when the file is the
/// whole configuration.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use httpeat::config::load_config;
///
/// let config = load_config(Path::new("httpeat.toml")).unwrap();
/// println!("Workers per lane: {}", config.tasks_count);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    Ok(config)
}

/// Loads a configuration file and validates it
pub fn load_and_validate(path: &Path) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Reads a list file (targets, mirrors or proxies), one entry per line
///
/// Blank lines and lines starting with `#` are ignored.
pub fn read_list_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_list(&content))
}

/// Parses every mirror rule line
pub fn parse_mirrors<S: AsRef<str>>(lines: &[S]) -> Result<Vec<MirrorRule>, ConfigError> {
    lines.iter().map(|line| line.as_ref().parse()).collect()
}

/// Parses every proxy lane line
pub fn parse_proxies<S: AsRef<str>>(lines: &[S]) -> Result<Vec<ProxyLane>, ConfigError> {
    lines.iter().map(|line| line.as_ref().parse()).collect()
}

impl FromStr for ProxyLane {
    type Err = ConfigError;

    /// Parses `<proxy-url> [tasks-count=<n>]`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let endpoint = parts
            .next()
            .ok_or_else(|| ConfigError::InvalidProxy("empty proxy entry".to_string()))?;

        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", endpoint, e)))?;
        match url.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {}
            other => {
                return Err(ConfigError::InvalidProxy(format!(
                    "'{}': unsupported proxy scheme '{}'",
                    endpoint, other
                )))
            }
        }

        let mut tasks_count = None;
        for option in parts {
            match option.split_once('=') {
                Some(("tasks-count", value)) => {
                    let n = value.parse::<usize>().map_err(|e| {
                        ConfigError::InvalidProxy(format!("'{}': bad tasks-count: {}", line, e))
                    })?;
                    tasks_count = Some(n);
                }
                _ => {
                    return Err(ConfigError::InvalidProxy(format!(
                        "'{}': unknown option '{}'",
                        line, option
                    )))
                }
            }
        }

        Ok(Self { url, tasks_count })
    }
}
