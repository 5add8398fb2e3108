//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests, including:
//! - Building HTTP clients for a lane (proxy, user agent, TLS verification)
//! - Fetching directory listings
//! - Streaming downloads to disk with per-read timeouts
//! - Mapping transport failures onto a small closed error type

use futures_util::StreamExt;
use reqwest::{Client, Proxy};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

/// A failed fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Other(String),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            // Refused or reset connections, peers closing mid-message and
            // truncated bodies all end up here
            Self::Connection(error_chain(&e))
        } else {
            Self::Other(error_chain(&e))
        }
    }
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Options shared by all clients of a run
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    /// Connect timeout, time to response headers, and maximum gap between
    /// two body reads
    pub timeout: Duration,
    pub no_ssl_verify: bool,
    /// Proxy endpoint; `None` for a direct connection
    pub proxy: Option<Url>,
    /// Transparently decode compressed responses (listings only)
    pub decompress: bool,
}

impl ClientOptions {
    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
            timeout: config.timeout_duration(),
            no_ssl_verify: config.no_ssl_verify,
            proxy: None,
            decompress: false,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<Url>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }
}

/// User agent sent when none is configured
pub fn default_user_agent() -> String {
    format!("httpeat/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `options` - Client options for the lane
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (bad proxy URL, TLS setup)
pub fn build_http_client(options: &ClientOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(options.user_agent.as_str())
        .connect_timeout(options.timeout)
        .danger_accept_invalid_certs(options.no_ssl_verify)
        .gzip(options.decompress)
        .brotli(options.decompress);

    if let Some(proxy) = &options.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// A client bound to one egress path
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(options: &ClientOptions) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(options)?,
            timeout: options.timeout,
        })
    }

    /// Fetches a directory listing and returns its body
    pub async fn fetch_listing(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.send(url).await?;
        with_timeout(self.timeout, response.text())
            .await?
            .map_err(FetchError::from)
    }

    /// Streams `url` into the file at `dest`
    ///
    /// Parent directories are created as needed and an existing file is
    /// truncated. `on_start` receives the response `Content-Length`, then
    /// `on_chunk` receives the byte count of every chunk written. A failed
    /// or abandoned download removes the partial file.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Total bytes written
    /// * `Err(FetchError)` - The attempt failed; `dest` does not exist
    pub async fn download<S, C>(
        &self,
        url: &Url,
        dest: &Path,
        on_start: S,
        mut on_chunk: C,
    ) -> Result<u64, FetchError>
    where
        S: FnOnce(Option<u64>),
        C: FnMut(u64),
    {
        let response = self.send(url).await?;
        let expected = response.content_length();
        on_start(expected);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let io_error = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let file = File::create(dest).await.map_err(io_error)?;
        let partial = PartialFile::new(dest);
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = with_timeout(self.timeout, stream.next()).await? {
            let chunk = chunk?;
            writer.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }

        writer.flush().await.map_err(io_error)?;

        if let Some(expected) = expected {
            if written < expected {
                return Err(FetchError::Connection(format!(
                    "body ended after {} of {} bytes",
                    written, expected
                )));
            }
        }

        partial.keep();
        Ok(written)
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let response = with_timeout(self.timeout, self.client.get(url.as_str()).send()).await??;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

async fn with_timeout<F: Future>(limit: Duration, future: F) -> Result<F::Output, FetchError> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| FetchError::Timeout)
}

/// Removes a partially written file unless kept
///
/// Also covers downloads abandoned on cancellation, when the future is
/// dropped mid-stream.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
                }
            }
        }
    }
}
