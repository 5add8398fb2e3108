//! Downloads of leaf targets: success, retries, failures, naming

use crate::support::{
    config, download_records, hang_up_server, host_dir, local_path, serve, session_dir,
    stalled_server,
};
use httpeat::crawler::{default_user_agent, EXIT_INTERRUPTED};
use httpeat::{Httpeat, ItemState};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_download_single_file() {
    let server = MockServer::start().await;
    serve(&server, "/a/b.img", "toto").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/b.img", server.uri());

    let httpeat = Httpeat::new(config(&session, &[url.clone()])).unwrap();
    let summary = httpeat.run().await.unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.download.items_total, 1);
    assert_eq!(summary.download.items_ok, 1);
    assert_eq!(summary.download.size_completed, 4);
    assert_eq!(summary.download.size_total, 4);

    let file = session.join("data").join(host_dir(&server)).join("a/b.img");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "toto");

    let records = download_records(&session);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, url);
    assert_eq!(records[0].state, ItemState::Ok);
    assert_eq!(records[0].size, Some(4));
    assert_eq!(records[0].local_path, file.display().to_string());
}

#[tokio::test]
async fn test_download_two_files() {
    let server = MockServer::start().await;
    serve(&server, "/a/1.img", "one").await;
    serve(&server, "/a/2.img", "two!").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let targets = vec![
        format!("{}/a/1.img", server.uri()),
        format!("{}/a/2.img", server.uri()),
    ];

    let summary = Httpeat::new(config(&session, &targets))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.download.items_ok, 2);
    assert_eq!(summary.download.size_completed, 7);
    for (target, body) in targets.iter().zip(["one", "two!"]) {
        let file = local_path(&session, target);
        assert_eq!(std::fs::read_to_string(file).unwrap(), body);
    }
}

#[tokio::test]
async fn test_long_file_name_is_shortened() {
    let name = format!("{}.img", "b".repeat(300));
    let server = MockServer::start().await;
    serve(&server, &format!("/a/{}", name), "long").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/{}", server.uri(), name);

    let summary = Httpeat::new(config(&session, &[url]))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.download.items_ok, 1);

    let short = format!("{}_JRQN6PSE_{}.img", "b".repeat(117), "b".repeat(113));
    let file = session
        .join("data")
        .join(host_dir(&server))
        .join("a")
        .join(short);
    assert_eq!(std::fs::read_to_string(file).unwrap(), "long");
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/slow.img"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    serve(&server, "/a/slow.img", "fast").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/slow.img", server.uri());
    let mut config = config(&session, &[url.clone()]);
    config.timeout = 0.5;
    config.retry_dl_networkerror = 3;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_ok, 1);
    assert!(summary.warnings.is_empty());
    assert_eq!(
        std::fs::read_to_string(local_path(&session, &url)).unwrap(),
        "fast"
    );
}

#[tokio::test]
async fn test_timeouts_exhaust_network_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/slow.img", server.uri());
    let mut config = config(&session, &[url.clone()]);
    config.timeout = 0.5;
    config.retry_dl_networkerror = 1;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_error, 1);
    assert_eq!(summary.exit_code(), 0);
    assert!(!local_path(&session, &url).exists());
}

#[tokio::test]
async fn test_dropped_connections_are_retried() {
    let (base, accepted) = hang_up_server(2, "toto").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/b.img", base);
    let mut config = config(&session, &[url.clone()]);
    config.retry_dl_networkerror = 3;
    config.retry_global_error = 0;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_ok, 1);
    assert!(summary.warnings.is_empty());
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert_eq!(
        std::fs::read_to_string(local_path(&session, &url)).unwrap(),
        "toto"
    );
}

#[tokio::test]
async fn test_dropped_connections_exhaust_network_budget() {
    let (base, accepted) = hang_up_server(2, "toto").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/b.img", base);
    let mut config = config(&session, &[url.clone()]);
    config.retry_dl_networkerror = 1;
    config.retry_global_error = 0;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_error, 1);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert!(!local_path(&session, &url).exists());
}

#[tokio::test]
async fn test_interrupted_download_is_removed_and_pending() {
    let base = stalled_server(b"0123456789", 1000).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/big.img", base);
    let httpeat = Httpeat::new(config(&session, &[url.clone()])).unwrap();

    let progress = httpeat.progress();
    let shutdown = async move {
        while progress.download().size_completed < 10 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    let summary = httpeat.run_until(shutdown).await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.exit_code(), EXIT_INTERRUPTED);
    assert!(!local_path(&session, &url).exists());

    let records = download_records(&session);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, ItemState::Pending);
}

#[tokio::test]
async fn test_connection_refused_is_error() {
    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = "http://127.0.0.1:1/a/b.img".to_string();
    let mut config = config(&session, &[url.clone()]);
    config.retry_dl_networkerror = 0;
    config.retry_global_error = 0;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_error, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert!(!local_path(&session, &url).exists());

    let records = download_records(&session);
    assert_eq!(records[0].state, ItemState::Error);
    assert!(records[0].message.is_some());
}

#[tokio::test]
async fn test_server_error_uses_global_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/b.img", server.uri());
    let mut config = config(&session, &[url.clone()]);
    config.retry_dl_networkerror = 5;
    config.retry_global_error = 2;

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_error, 1);
    let records = download_records(&session);
    assert_eq!(records[0].message.as_deref(), Some("HTTP status 500"));
    assert!(!local_path(&session, &url).exists());
}

#[tokio::test]
async fn test_default_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/b.img"))
        .and(header("user-agent", default_user_agent().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("toto"))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let url = format!("{}/a/b.img", server.uri());

    let summary = Httpeat::new(config(&session, &[url]))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.download.items_ok, 1);
}

#[tokio::test]
async fn test_custom_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/b.img"))
        .and(header("user-agent", "harvest-bot/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("toto"))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/b.img", server.uri())]);
    config.user_agent = Some("harvest-bot/2.0".to_string());

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.download.items_ok, 1);
}
