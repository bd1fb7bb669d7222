use std::sync::Once;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use portal_core::SourceId;
use portal_engine::{
    FetchSettings, InstrumentSource, ReqwestPortal, WatcherSettings, WebDavClient, WebDavSettings,
    Watcher, UNKNOWN_TELESCOPE,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(portal_logging::initialize_for_tests);
}

const SAVE: &str = "/dav/u1/Candidates/Skyportal";

fn store(server: &MockServer) -> WebDavClient {
    let settings = WebDavSettings {
        base_url: format!("{}/dav", server.uri()),
        user_id: "u1".to_string(),
        username: "bob".to_string(),
        token: "pw".to_string(),
        save_path: "Candidates/Skyportal".to_string(),
    };
    WebDavClient::new(&settings, &FetchSettings::default()).unwrap()
}

fn portal(server: &MockServer) -> ReqwestPortal {
    let api_root = format!("{}/api", server.uri());
    ReqwestPortal::new(&api_root, "tok", &FetchSettings::default()).unwrap()
}

fn settings(instruments: InstrumentSource) -> WatcherSettings {
    WatcherSettings {
        group_ids: vec![3],
        instruments,
        source_pause: Duration::from_millis(1),
        failure_pause: Duration::from_millis(1),
        ..WatcherSettings::default()
    }
}

fn listing(ids: &[&str]) -> ResponseTemplate {
    let sources: Vec<_> = ids.iter().map(|id| json!({"id": id})).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"sources": sources, "totalMatches": ids.len()}
    }))
}

#[tokio::test]
async fn each_source_is_mirrored_once_across_polls() {
    init_logging();
    let server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2025, 5, 15, 0, 0, 0).unwrap();
    Mock::given(method("GET"))
        .and(path("/api/sources"))
        .and(query_param("savedAfter", "2025-05-15T00:00:00+00:00"))
        .respond_with(listing(&["ZTF1", "ZTF2"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sources"))
        .respond_with(listing(&["ZTF2", "ZTF3"]))
        .mount(&server)
        .await;
    for id in ["ZTF1", "ZTF2", "ZTF3"] {
        Mock::given(method("MKCOL"))
            .and(path(format!("{SAVE}/{id}")))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("MKCOL"))
            .and(path(format!("{SAVE}/{id}/TNT")))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
    }

    let portal = portal(&server);
    let store = store(&server);
    let mut watcher = Watcher::new(
        &portal,
        &store,
        settings(InstrumentSource::BaseList(vec!["TNT".to_string()])),
        start,
    );

    let first = watcher.poll_once().await.unwrap();
    assert_eq!(first.new_sources, vec![SourceId::from("ZTF1"), SourceId::from("ZTF2")]);
    assert_eq!(first.mirrored.len(), 2);
    assert!(watcher.since() > start);

    let second = watcher.poll_once().await.unwrap();
    assert_eq!(second.new_sources, vec![SourceId::from("ZTF3")]);
    assert_eq!(watcher.seen().len(), 3);
}

#[tokio::test]
async fn failed_listing_keeps_the_window() {
    init_logging();
    let server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2025, 5, 15, 0, 0, 0).unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let portal = portal(&server);
    let store = store(&server);
    let mut watcher = Watcher::new(&portal, &store, settings(InstrumentSource::PerSource), start);

    assert!(watcher.poll_once().await.is_err());
    assert_eq!(watcher.since(), start);
    assert!(watcher.seen().is_empty());
}

#[tokio::test]
async fn unmirrorable_source_is_reported_and_not_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sources"))
        .respond_with(listing(&["ZTF9"]))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal(&server);
    let store = store(&server);
    let mut watcher = Watcher::new(
        &portal,
        &store,
        settings(InstrumentSource::BaseList(Vec::new())),
        Utc::now(),
    );

    let report = watcher.poll_once().await.unwrap();
    assert_eq!(report.failed, vec![SourceId::from("ZTF9")]);
    assert!(report.mirrored.is_empty());
    assert!(watcher.poll_once().await.unwrap().new_sources.is_empty());
}

#[tokio::test]
async fn per_source_instruments_pair_telescope_and_instrument() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sources/ZTF5/photometry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [{"instrument_name": "TRE"}, {"instrument_name": "TRE"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sources/ZTF5/spectra"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"spectra": [{"instrument_name": "Mystery"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/instrument"))
        .and(query_param("name", "TRE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [{"telescope": {"name": "TAROT"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/instrument"))
        .and(query_param("name", "Mystery"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let portal = portal(&server);
    let store = store(&server);
    let watcher = Watcher::new(&portal, &store, settings(InstrumentSource::PerSource), Utc::now());

    let strings = watcher.instrument_strings(&SourceId::from("ZTF5")).await;
    assert_eq!(
        strings,
        vec![
            format!("{UNKNOWN_TELESCOPE}-Mystery"),
            "TAROT-TRE".to_string(),
        ]
    );
}
