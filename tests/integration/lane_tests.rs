//! Proxy and mirror lanes
//!
//! Mock servers stand in for HTTP proxies: a plain-HTTP request through a
//! proxy carries the absolute target URL, whose path the matchers still see.

use crate::support::{config, download_records, local_path, serve, serve_times, session_dir};
use httpeat::{Httpeat, ItemState};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_two_proxies_share_the_work() {
    let proxy1 = MockServer::start().await;
    let proxy2 = MockServer::start().await;
    for proxy in [&proxy1, &proxy2] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .expect(1)
            .mount(proxy)
            .await;
    }

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    // Never resolvable: only a proxy can answer
    let targets = vec![
        "http://files.invalid/a/1.img".to_string(),
        "http://files.invalid/a/2.img".to_string(),
    ];
    let mut config = config(&session, &targets);
    config.proxy = vec![
        format!("{}/ tasks-count=1", proxy1.uri()),
        format!("{}/ tasks-count=1", proxy2.uri()),
    ];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_ok, 2);
    for target in &targets {
        assert_eq!(
            std::fs::read_to_string(local_path(&session, target)).unwrap(),
            "via proxy"
        );
    }
}

#[tokio::test]
async fn test_proxy_lists_are_kept_in_session() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .mount(&proxy)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &["http://files.invalid/a/1.img".to_string()]);
    config.proxy = vec![format!("{}/", proxy.uri())];

    Httpeat::new(config).unwrap().run().await.unwrap();

    let proxies = std::fs::read_to_string(session.join("proxies.txt")).unwrap();
    assert_eq!(proxies.trim(), format!("{}/", proxy.uri()));
    let targets = std::fs::read_to_string(session.join("targets.txt")).unwrap();
    assert_eq!(targets.trim(), "http://files.invalid/a/1.img");
}

#[tokio::test]
async fn test_mirror_adds_a_lane() {
    let canonical = MockServer::start().await;
    let mirror = MockServer::start().await;

    serve(
        &canonical,
        "/a/",
        r#"<a href="b1.img">b1.img</a><a href="b2.img">b2.img</a>"#,
    )
    .await;
    serve_times(&canonical, "/a/b1.img", "one", 1).await;
    serve_times(&mirror, "/pub/a/b2.img", "two", 1).await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/", canonical.uri())]);
    config.tasks_count = 1;
    config.mirror = vec![format!("{}/pub/a/ mirrors {}/a/", mirror.uri(), canonical.uri())];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.download.items_ok, 2);

    // Files land under the canonical host whichever lane fetched them
    let records = download_records(&session);
    assert_eq!(records[1].url, format!("{}/a/b2.img", canonical.uri()));
    assert_eq!(records[1].state, ItemState::Ok);
    assert_eq!(
        std::fs::read_to_string(local_path(&session, &records[1].url)).unwrap(),
        "two"
    );
}

#[tokio::test]
async fn test_mirror_not_used_for_literal_mirror_url() {
    let host1 = MockServer::start().await;
    let host2 = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&host1)
        .await;
    Mock::given(method("GET"))
        .and(path("/pub/a/b2.img"))
        .respond_with(ResponseTemplate::new(200).set_body_string("b2"))
        .expect(1)
        .mount(&host2)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let target = format!("{}/pub/a/b2.img", host2.uri());
    let mut config = config(&session, &[target.clone()]);
    config.mirror = vec![format!("{}/pub/a/ mirrors {}/a/", host2.uri(), host1.uri())];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.download.items_ok, 1);
    assert_eq!(
        std::fs::read_to_string(local_path(&session, &target)).unwrap(),
        "b2"
    );
}
