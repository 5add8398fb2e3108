//! Resuming sessions

use crate::support::{config, download_records, resume_config, serve_times, session_dir};
use httpeat::{Httpeat, HttpeatError, ItemState};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_resume_does_not_refetch() {
    let server = MockServer::start().await;
    serve_times(&server, "/a/", r#"<a href="b.img">b.img</a>"#, 1).await;
    serve_times(&server, "/a/b.img", "toto", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);

    let first = Httpeat::new(config(&session, &[format!("{}/a/", server.uri())]))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.download.items_ok, 1);
    let ledger = std::fs::read_to_string(session.join("state_download.csv")).unwrap();

    let second = Httpeat::new(resume_config(&session))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.download.items_ok, 1);
    assert_eq!(second.download.items_total, 1);
    assert_eq!(second.download.size_completed, 4);
    assert_eq!(
        std::fs::read_to_string(session.join("state_download.csv")).unwrap(),
        ledger
    );
}

#[tokio::test]
async fn test_resume_retries_failed_run_items_only_once_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/bad.img"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    serve_times(&server, "/a/good.img", "good", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let targets = vec![
        format!("{}/a/bad.img", server.uri()),
        format!("{}/a/good.img", server.uri()),
    ];
    let mut first = config(&session, &targets);
    first.retry_global_error = 0;
    Httpeat::new(first).unwrap().run().await.unwrap();

    // Terminal errors stay terminal on resume
    let summary = Httpeat::new(resume_config(&session))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.download.items_error, 1);
    assert_eq!(summary.download.items_ok, 1);

    let states: Vec<_> = download_records(&session)
        .into_iter()
        .map(|r| r.state)
        .collect();
    assert_eq!(states, vec![ItemState::Error, ItemState::Ok]);
}

#[tokio::test]
async fn test_resume_adds_new_targets() {
    let server = MockServer::start().await;
    serve_times(&server, "/a/1.img", "one", 1).await;
    serve_times(&server, "/a/2.img", "two", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    Httpeat::new(config(&session, &[format!("{}/a/1.img", server.uri())]))
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut resume = resume_config(&session);
    resume.target_urls = vec![format!("{}/a/2.img", server.uri())];
    let summary = Httpeat::new(resume).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_total, 2);
    assert_eq!(summary.download.items_ok, 2);
    let targets = std::fs::read_to_string(session.join("targets.txt")).unwrap();
    assert_eq!(targets.lines().count(), 2);
}

#[tokio::test]
async fn test_new_session_over_existing_one_fails() {
    let server = MockServer::start().await;
    serve_times(&server, "/a/1.img", "one", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let target = vec![format!("{}/a/1.img", server.uri())];
    Httpeat::new(config(&session, &target))
        .unwrap()
        .run()
        .await
        .unwrap();

    let err = Httpeat::new(config(&session, &target)).unwrap_err();
    assert!(matches!(err, HttpeatError::Session(_)));
}

#[tokio::test]
async fn test_interrupt_during_wait_keeps_finished_download() {
    let server = MockServer::start().await;
    serve_times(&server, "/a/b.img", "toto", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/b.img", server.uri())]);
    config.wait = 60.0;
    let httpeat = Httpeat::new(config).unwrap();

    let progress = httpeat.progress();
    let shutdown = async move {
        while progress.download().items_ok < 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    let summary = httpeat.run_until(shutdown).await.unwrap();
    assert!(summary.interrupted);
    assert_eq!(download_records(&session)[0].state, ItemState::Ok);

    let summary = Httpeat::new(resume_config(&session))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(!summary.interrupted);
    assert_eq!(summary.download.items_ok, 1);
}
