//! Skip rules applied at discovery

use crate::support::{config, download_records, index_records, local_path, serve, session_dir};
use httpeat::{Httpeat, ItemState};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIZED_LISTING: &str = "<table>\
    <tr><td><a href='toto.png'>toto.png</a></td><td>1G</td></tr>\
    <tr><td><a href='bibi.png'>bibi.png</a></td><td>3G</td></tr>\
    </table>";

async fn never_served(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_skip_download_size() {
    let server = MockServer::start().await;
    serve(&server, "/a/", SIZED_LISTING).await;
    serve(&server, "/a/toto.png", "toto").await;
    never_served(&server, "/a/bibi.png").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/", server.uri())]);
    config.skip = vec!["dl-size-gt:2G".to_string()];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.download.items_ok, 1);
    assert_eq!(summary.download.items_skipped, 1);

    let records = download_records(&session);
    assert_eq!(records.len(), 2);
    assert!(records[0].url.ends_with("/a/toto.png"));
    assert_eq!(records[0].state, ItemState::Ok);
    assert!(records[1].url.ends_with("/a/bibi.png"));
    assert_eq!(records[1].state, ItemState::Skipped);
    assert_eq!(records[1].size, Some(3 << 30));
    let rule = format!("dl-size-gt:{}", 2u64 << 30);
    assert_eq!(records[1].message.as_deref(), Some(rule.as_str()));

    assert!(!local_path(&session, &records[1].url).exists());
}

#[tokio::test]
async fn test_skip_download_paths() {
    let server = MockServer::start().await;
    serve(&server, "/a/", SIZED_LISTING).await;
    never_served(&server, "/a/toto.png").await;
    never_served(&server, "/a/bibi.png").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/", server.uri())]);
    config.skip = vec![
        "dl-path:.*/toto\\.png".to_string(),
        "dl-path:bibi".to_string(),
    ];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.download.items_skipped, 2);
    assert_eq!(summary.download.items_ok, 0);

    for record in download_records(&session) {
        assert_eq!(record.state, ItemState::Skipped);
        assert!(!local_path(&session, &record.url).exists());
    }
}

#[tokio::test]
async fn test_skip_leaf_target() {
    let server = MockServer::start().await;
    never_served(&server, "/a/b.iso").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/b.iso", server.uri())]);
    config.skip = vec!["dl-path:\\.iso$".to_string()];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.download.items_skipped, 1);
}

#[tokio::test]
async fn test_skip_index_path() {
    let server = MockServer::start().await;
    serve(&server, "/a/", r#"<a href="old/">old/</a><a href="new/">new/</a>"#).await;
    never_served(&server, "/a/old/").await;
    serve(&server, "/a/new/", r#"<a href="n.img">n.img</a>"#).await;
    serve(&server, "/a/new/n.img", "new").await;

    let tmp = TempDir::new().unwrap();
    let session = session_dir(&tmp);
    let mut config = config(&session, &[format!("{}/a/", server.uri())]);
    config.skip = vec!["idx-path:/old/$".to_string()];

    let summary = Httpeat::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.index.items_ok, 2);
    assert_eq!(summary.download.items_ok, 1);
    assert!(index_records(&session)
        .iter()
        .all(|r| !r.url.ends_with("/old/")));
}
