//! Shared helpers for the integration tests

use httpeat::storage::{read_records, LedgerRecord};
use httpeat::{Config, PathEncoder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Session directory inside a temporary directory
pub fn session_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("session")
}

/// A new-session configuration with short timeouts
pub fn config(session: &Path, targets: &[String]) -> Config {
    Config {
        session_dir: session.to_path_buf(),
        target_urls: targets.to_vec(),
        timeout: 5.0,
        ..Config::default()
    }
}

/// Configuration resuming the session in `session`
pub fn resume_config(session: &Path) -> Config {
    Config {
        session_new: false,
        ..config(session, &[])
    }
}

/// Serves `body` at `route`
pub async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Serves `body` at `route`, expecting exactly `times` requests
pub async fn serve_times(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .expect(times)
        .mount(server)
        .await;
}

/// Records of the download ledger, in ledger order
pub fn download_records(session: &Path) -> Vec<LedgerRecord> {
    read_records(&session.join("state_download.csv")).unwrap()
}

/// Records of the index ledger, in ledger order
pub fn index_records(session: &Path) -> Vec<LedgerRecord> {
    read_records(&session.join("state_index.csv")).unwrap()
}

/// Local path a URL downloads to
pub fn local_path(session: &Path, url: &str) -> PathBuf {
    PathEncoder::new(session.join("data"), 255).encode(&Url::parse(url).unwrap())
}

/// Host directory name of a mock server inside the data tree
pub fn host_dir(server: &MockServer) -> String {
    let url = Url::parse(&server.uri()).unwrap();
    format!("{}:{}", url.host_str().unwrap(), url.port().unwrap())
}

/// Reads one request head from `socket`
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
}

/// Bare HTTP server that reads the request then hangs up on the first
/// `drops` connections, and serves `body` on the following ones
///
/// Returns the base URL and the number of connections accepted so far.
pub async fn hang_up_server(drops: usize, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            if n < drops {
                continue;
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (base, accepted)
}

/// Bare HTTP server announcing `length` bytes, sending `head` of them and
/// then stalling
pub async fn stalled_server(head: &'static [u8], length: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let head_line = format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n", length);
                let _ = socket.write_all(head_line.as_bytes()).await;
                let _ = socket.write_all(head).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    base
}
