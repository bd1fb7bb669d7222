use std::sync::Once;
use std::time::Duration;

use portal_core::{Cosmology, Deriver, ExtinctionLookup, GroupOutcome, RetryPolicy, SourceId};
use portal_engine::{ExtractionSettings, Extractor, FetchSettings, GroupReport, ReqwestPortal};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(portal_logging::initialize_for_tests);
}

fn settings(group_ids: Vec<i64>, max_retries: u32) -> ExtractionSettings {
    ExtractionSettings {
        group_ids,
        num_per_page: 2,
        retry: RetryPolicy {
            max_retries,
            rate_limit_backoff: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
        },
        ..ExtractionSettings::default()
    }
}

fn deriver() -> Deriver {
    Deriver::new(ExtinctionLookup::Disabled, Cosmology::planck18())
}

fn source(id: &str) -> Value {
    json!({"id": id, "ra": 150.0, "dec": 2.2, "altdata": {"dist_Mpc": 10}})
}

fn page(sources: Vec<Value>, total: usize, query_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"sources": sources, "totalMatches": total, "queryID": query_id}
    }))
}

fn failure() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({"status": "error", "message": "database busy"}))
}

async fn run(server: &MockServer, settings: &ExtractionSettings) -> portal_engine::ExtractionReport {
    let api_root = format!("{}/api", server.uri());
    let portal = ReqwestPortal::new(&api_root, "tok", &FetchSettings::default()).unwrap();
    let deriver = deriver();
    Extractor::new(&portal, &deriver, settings).run().await
}

fn ids(report: &portal_engine::ExtractionReport) -> Vec<SourceId> {
    report.rows.iter().map(|row| row.source_id.clone()).collect()
}

#[tokio::test]
async fn pages_until_every_match_is_retrieved() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sources"))
        .and(query_param("pageNumber", "1"))
        .and(query_param_is_missing("queryID"))
        .respond_with(page(vec![source("a"), source("b")], 3, "q-7"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sources"))
        .and(query_param("pageNumber", "2"))
        .and(query_param("queryID", "q-7"))
        .respond_with(page(vec![source("c")], 3, "q-7"))
        .expect(1)
        .mount(&server)
        .await;

    let report = run(&server, &settings(vec![5], 3)).await;

    assert_eq!(
        ids(&report),
        vec![SourceId::from("a"), SourceId::from("b"), SourceId::from("c")]
    );
    assert!(report.rows.iter().all(|row| row.group_id == 5));
    assert_eq!(report.rows[0].luminosity_distance, Some(10.0));
    assert_eq!(
        report.groups,
        vec![GroupReport {
            group_id: 5,
            outcome: GroupOutcome::Completed { retrieved: 3 },
        }]
    );
}

#[tokio::test]
async fn rate_limits_are_waited_out_without_giving_up() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(page(vec![source("a")], 1, "q"))
        .mount(&server)
        .await;

    // Four 429s against a budget of one: none of them count.
    let report = run(&server, &settings(vec![1], 1)).await;
    assert_eq!(ids(&report), vec![SourceId::from("a")]);
    assert_eq!(
        report.groups[0].outcome,
        GroupOutcome::Completed { retrieved: 1 }
    );
}

#[tokio::test]
async fn successful_page_restores_the_retry_budget() {
    init_logging();
    let server = MockServer::start().await;
    for (number, sources) in [("1", vec![source("a"), source("b")]), ("2", vec![source("c")])] {
        Mock::given(method("GET"))
            .and(query_param("pageNumber", number))
            .respond_with(failure())
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("pageNumber", number))
            .respond_with(page(sources, 3, "q"))
            .mount(&server)
            .await;
    }

    // Four errors in total, never three in a row.
    let report = run(&server, &settings(vec![2], 3)).await;
    assert_eq!(report.rows.len(), 3);
    assert_eq!(
        report.groups[0].outcome,
        GroupOutcome::Completed { retrieved: 3 }
    );
}

#[tokio::test]
async fn exhausted_group_keeps_its_rows_and_later_groups_still_run() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("group_ids", "1"))
        .and(query_param("pageNumber", "1"))
        .respond_with(page(vec![source("a"), source("b")], 4, "q"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("group_ids", "1"))
        .and(query_param("pageNumber", "2"))
        .respond_with(failure())
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("group_ids", "2"))
        .respond_with(page(vec![source("z")], 1, "q2"))
        .mount(&server)
        .await;

    let report = run(&server, &settings(vec![1, 2], 3)).await;

    assert_eq!(
        ids(&report),
        vec![SourceId::from("a"), SourceId::from("b"), SourceId::from("z")]
    );
    assert_eq!(
        report.groups,
        vec![
            GroupReport {
                group_id: 1,
                outcome: GroupOutcome::ExhaustedRetries {
                    retrieved: 2,
                    last_error: "api error: database busy".to_string(),
                },
            },
            GroupReport {
                group_id: 2,
                outcome: GroupOutcome::Completed { retrieved: 1 },
            },
        ]
    );
    assert_eq!(report.exhausted_groups().collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn empty_group_yields_no_rows() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(page(Vec::new(), 0, "q"))
        .expect(1)
        .mount(&server)
        .await;

    let report = run(&server, &settings(vec![8], 3)).await;
    assert!(report.rows.is_empty());
    assert_eq!(
        report.groups[0].outcome,
        GroupOutcome::Completed { retrieved: 0 }
    );
}
