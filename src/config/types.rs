use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default number of concurrent workers per lane
pub const TASKS_DEFAULT: usize = 3;

/// Default per-request timeout, in seconds
pub const TIMEOUT_DEFAULT: f64 = 60.0;

/// Default per-item retry budget for network errors while downloading
pub const RETRY_DL_NETWORKERROR_DEFAULT: u32 = 3;

/// Default per-item retry budget for network errors while crawling indexes
pub const RETRY_INDEX_NETWORKERROR_DEFAULT: u32 = 3;

/// Default run-wide retry budget for all other errors
pub const RETRY_GLOBAL_ERROR_DEFAULT: u32 = 10;

/// Main configuration structure for httpeat
///
/// Loaded from an optional TOML file (kebab-case keys) and overlaid with
/// command-line options. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Create a new session rather than resuming one
    pub session_new: bool,

    /// Directory holding the session's ledgers, lists, log and data
    pub session_dir: PathBuf,

    /// URLs to harvest; a trailing `/` marks a directory index
    pub target_urls: Vec<String>,

    /// Mirror rules, `<mirror-url> mirrors <canonical-url>`
    pub mirror: Vec<String>,

    /// Proxy lanes, `<proxy-url> [tasks-count=<n>]`
    pub proxy: Vec<String>,

    /// Default number of workers per lane
    pub tasks_count: usize,

    /// Per-request timeout in seconds
    pub timeout: f64,

    /// Skip rules, `<kind>:<argument>`
    pub skip: Vec<String>,

    /// Delay after each request of a worker, in seconds
    pub wait: f64,

    /// User-Agent header; defaults to `httpeat/<version>`
    pub user_agent: Option<String>,

    pub retry_dl_networkerror: u32,
    pub retry_index_networkerror: u32,
    pub retry_global_error: u32,

    /// Accept invalid TLS certificates
    pub no_ssl_verify: bool,

    /// Only crawl indexes, do not download files
    pub index_only: bool,

    /// Only download files already known to the session
    pub download_only: bool,

    /// Maximum byte length of a local path component
    pub name_max: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_new: true,
            session_dir: PathBuf::new(),
            target_urls: Vec::new(),
            mirror: Vec::new(),
            proxy: Vec::new(),
            tasks_count: TASKS_DEFAULT,
            timeout: TIMEOUT_DEFAULT,
            skip: Vec::new(),
            wait: 0.0,
            user_agent: None,
            retry_dl_networkerror: RETRY_DL_NETWORKERROR_DEFAULT,
            retry_index_networkerror: RETRY_INDEX_NETWORKERROR_DEFAULT,
            retry_global_error: RETRY_GLOBAL_ERROR_DEFAULT,
            no_ssl_verify: false,
            index_only: false,
            download_only: false,
            name_max: crate::url::NAME_MAX_DEFAULT,
        }
    }
}

impl Config {
    /// Per-request timeout
    ///
    /// Saturates on values [`validate`](crate::config::validate) rejects.
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }

    /// Delay after each request, zero when out of range
    pub fn wait_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.wait).unwrap_or(Duration::ZERO)
    }
}

/// An outbound proxy with an optional worker-count override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLane {
    /// Proxy endpoint (`http://`, `https://` or `socks5://`)
    pub url: Url,

    /// Workers for this proxy; `None` means the run-wide `tasks_count`
    pub tasks_count: Option<usize>,
}

impl ProxyLane {
    /// Number of workers for this lane given the run-wide default
    pub fn workers(&self, default: usize) -> usize {
        self.tasks_count.unwrap_or(default)
    }
}
