//! Integration tests running the analyser against a mock BrAPI server

use brapi_conformance_analyzer::{Analyser, AnalysisOutcome};
use brapi_conformance_common::{
    AnalyserError, AnalysisReport, AuthorizationProvider, Level, NoAuthorization, OptionsFile,
};
use brapi_conformance_parser::OpenApiParser;
use mockall::mock;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mock! {
    pub Auth {}

    impl AuthorizationProvider for Auth {
        fn required(&self) -> bool;
        fn authorization(&self) -> brapi_conformance_common::Result<Option<String>>;
    }
}

fn fixture_parser() -> OpenApiParser {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/brapi_core.yaml");
    OpenApiParser::from_file(fixture).unwrap()
}

fn options(yaml: &str, server: &MockServer) -> OptionsFile {
    OptionsFile::from_yaml(yaml)
        .unwrap()
        .with_base_url(format!("{}/brapi/v2", server.uri()))
}

fn keys(outcome: &AnalysisOutcome) -> Vec<String> {
    outcome
        .reports
        .iter()
        .map(|r| r.request.key().to_string())
        .collect()
}

fn study_list() -> serde_json::Value {
    json!({
        "metadata": {"pagination": {}},
        "result": {"data": [{"studyDbId": "s1", "studyName": "Yield Trial", "active": null}]}
    })
}

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_threads_variables() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/brapi/v2/commoncropnames",
        json!({"metadata": {}, "result": {"data": ["Tomatillo"]}}),
        1,
    )
    .await;
    mount_get(&server, "/brapi/v2/studies", study_list(), 1).await;
    mount_get(
        &server,
        "/brapi/v2/studies/s1",
        json!({"metadata": {}, "result": {"studyDbId": "s1", "studyName": "Yield Trial"}}),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/brapi/v2/search/studies"))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(json!({"result": {"searchResultsDbId": "sr1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, "/brapi/v2/search/studies/sr1", study_list(), 1).await;
    mount_get(
        &server,
        "/brapi/v2/studies/table",
        json!({"metadata": {}, "result": {"headerRow": ["studyDbId"], "data": [["s1"]]}}),
        1,
    )
    .await;

    let analyser = Analyser::new(
        &fixture_parser(),
        &options("{}", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();
    let outcome = analyser.analyse_all(CancellationToken::new()).await;

    assert!(!outcome.cancelled);
    assert_eq!(
        keys(&outcome),
        vec![
            "GET /commoncropnames",
            "GET /germplasm/{germplasmDbId}/pedigree",
            "GET /studies",
            "GET /studies/{studyDbId}",
            "POST /search/studies",
            "GET /search/studies/{searchResultsDbId}",
            "GET /studies/table",
        ]
    );

    // the pedigree hangs off a collection the document does not declare
    let pedigree = &outcome.reports[1];
    assert_eq!(pedigree.error_key(), Some(AnalysisReport::PRE_EXECUTION));
    assert!(pedigree.error.as_ref().unwrap().message.contains("GET /germplasm"));

    let search_results = &outcome.reports[5];
    assert_eq!(search_results.status_code, Some(200));
    assert!(search_results
        .uri
        .as_deref()
        .unwrap()
        .ends_with("/brapi/v2/search/studies/sr1"));

    let list = &outcome.reports[2];
    assert!(list.is_success());
    assert_eq!(list.count_at_least(Level::Error), 0);

    let summary = outcome.summary();
    assert_eq!(summary.requests, 7);
    assert_eq!(summary.succeeded, 6);
    assert_eq!(summary.pre_execution_failures, 1);
}

#[tokio::test]
async fn test_id_matching_literal_sibling_validates_against_its_own_operation() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/brapi/v2/studies",
        json!({
            "metadata": {},
            "result": {"data": [{"studyDbId": "table", "studyName": "Tables"}]}
        }),
        1,
    )
    .await;
    mount_get(
        &server,
        "/brapi/v2/studies/table",
        json!({"metadata": {}, "result": {"studyDbId": "table", "studyName": "Tables"}}),
        1,
    )
    .await;

    let yaml = "special: []\ndefaults: {search: false, searchResults: false, table: false}";
    let analyser = Analyser::new(
        &fixture_parser(),
        &options(yaml, &server),
        Box::new(NoAuthorization),
    )
    .unwrap();
    let outcome = analyser
        .analyse_entity("Study", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        keys(&outcome),
        vec!["GET /studies", "GET /studies/{studyDbId}"]
    );
    let single = &outcome.reports[1];
    assert!(single.uri.as_deref().unwrap().ends_with("/brapi/v2/studies/table"));
    assert!(single.is_success());
    assert_eq!(single.count_at_least(Level::Error), 0);
}

#[tokio::test]
async fn test_missing_parent_collection_sends_nothing() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/brapi/v2/germplasm/g1/pedigree",
        json!({"result": {}}),
        0,
    )
    .await;

    let analyser = Analyser::new(
        &fixture_parser(),
        &options("special: []", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();
    let outcome = analyser
        .analyse_entity("Pedigree", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 1);
    let report = &outcome.reports[0];
    assert_eq!(report.error_key(), Some(AnalysisReport::PRE_EXECUTION));
    assert_eq!(report.status_code, None);
    assert!(report.uri.is_none());
}

#[tokio::test]
async fn test_crop_partitioning_scopes_query_and_body() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/brapi/v2/commoncropnames",
        json!({"metadata": {}, "result": {"data": ["Tomatillo", "Maize"]}}),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/brapi/v2/studies"))
        .and(query_param("commonCropName", "Tomatillo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(study_list()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/brapi/v2/search/studies"))
        .and(body_json(json!({"commonCropNames": ["Tomatillo"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(study_list()))
        .expect(1)
        .mount(&server)
        .await;

    let analyser = Analyser::new(
        &fixture_parser(),
        &options("partitionedByCrop: true", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();
    let outcome = analyser
        .analyse_entity("Study", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.reports[0].request.key().to_string(),
        "GET /commoncropnames"
    );
    assert!(outcome.reports[1].is_success());
    assert!(outcome.reports[1]
        .uri
        .as_deref()
        .unwrap()
        .ends_with("/brapi/v2/studies?commonCropName=Tomatillo"));
}

#[tokio::test]
async fn test_unresolved_identifier_skips_request() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/brapi/v2/studies",
        json!({"metadata": {}, "result": {"data": []}}),
        1,
    )
    .await;

    let yaml = r#"
special: []
defaults:
  list: true
  get: true
  search: false
  searchResults: false
  table: false
"#;
    let analyser = Analyser::new(
        &fixture_parser(),
        &options(yaml, &server),
        Box::new(NoAuthorization),
    )
    .unwrap();
    let outcome = analyser
        .analyse_entity("Study", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 2);

    let list = &outcome.reports[0];
    assert!(list.is_success());
    assert!(list
        .validation_messages
        .iter()
        .any(|m| m.key == "extraction.noMatch" && m.level == Level::Warn));

    let get = &outcome.reports[1];
    assert_eq!(get.error_key(), Some(AnalysisReport::PRE_EXECUTION));
    assert!(get.error.as_ref().unwrap().message.contains("{studyDbId}"));

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_is_reported() {
    let options = OptionsFile::from_yaml("special: []\ntimeoutSecs: 5")
        .unwrap()
        .with_base_url("http://127.0.0.1:1/brapi/v2");
    let analyser = Analyser::new(&fixture_parser(), &options, Box::new(NoAuthorization)).unwrap();

    let outcome = analyser
        .analyse_entity("Study", CancellationToken::new())
        .await
        .unwrap();

    let list = &outcome.reports[0];
    assert_eq!(list.error_key(), Some(AnalysisReport::TRANSPORT));
    assert_eq!(list.error.as_ref().unwrap().level, Level::Error);
    assert_eq!(list.status_code, None);

    // nothing was extracted, so the single-entity request cannot be built
    assert_eq!(
        outcome.reports[1].error_key(),
        Some(AnalysisReport::PRE_EXECUTION)
    );
    assert_eq!(outcome.summary().succeeded, 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    let analyser = Analyser::new(
        &fixture_parser(),
        &options("{}", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = analyser.analyse_all(cancel).await;

    assert!(outcome.cancelled);
    assert!(outcome.reports.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_interrupts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brapi/v2/studies"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(study_list())
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let analyser = Analyser::new(
        &fixture_parser(),
        &options("special: []", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let outcome = analyser.analyse_entity("Study", cancel).await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(
        outcome.reports[0].error_key(),
        Some(AnalysisReport::CANCELLED)
    );
    assert_eq!(outcome.summary().verdict(), "INCOMPLETE");
}

const GERMPLASM_DOCUMENT: &str = r#"
openapi: 3.0.0
info: {title: BrAPI-Germplasm, version: "2.1"}
paths:
  /germplasm:
    get:
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: {title: GermplasmListResponse, type: object}
  /germplasm/{germplasmDbId}/pedigree:
    get:
      parameters:
        - {name: germplasmDbId, in: path, required: true, schema: {type: string}}
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: {title: PedigreeListResponse, type: object}
  /germplasm/{germplasmDbId}/progeny:
    get:
      parameters:
        - {name: germplasmDbId, in: path, required: true, schema: {type: string}}
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: {title: ProgenyListResponse, type: object}
"#;

async fn run_germplasm(strategy: &str, expected_list_calls: u64) -> AnalysisOutcome {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/brapi/v2/germplasm",
        json!({"result": {"data": [{"germplasmDbId": "g1"}]}}),
        expected_list_calls,
    )
    .await;
    mount_get(
        &server,
        "/brapi/v2/germplasm/g1/pedigree",
        json!({"result": {}}),
        1,
    )
    .await;
    mount_get(
        &server,
        "/brapi/v2/germplasm/g1/progeny",
        json!({"result": {}}),
        1,
    )
    .await;

    let parser = OpenApiParser::from_source(GERMPLASM_DOCUMENT).unwrap();
    let yaml = format!("special: []\nprerequisiteStrategy: {strategy}");
    let analyser =
        Analyser::new(&parser, &options(&yaml, &server), Box::new(NoAuthorization)).unwrap();

    let outcome = analyser.analyse_all(CancellationToken::new()).await;
    server.verify().await;
    outcome
}

#[tokio::test]
async fn test_prerequisites_rerun_by_default() {
    let outcome = run_germplasm("always", 3).await;

    // prerequisite runs are not reported on their own
    assert_eq!(outcome.reports.len(), 3);
    assert!(outcome.reports.iter().all(AnalysisReport::is_success));
}

#[tokio::test]
async fn test_prerequisites_run_once() {
    let outcome = run_germplasm("once", 1).await;

    assert_eq!(outcome.reports.len(), 3);
    assert!(outcome.reports.iter().all(AnalysisReport::is_success));
}

#[tokio::test]
async fn test_authorization_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brapi/v2/commoncropnames"))
        .and(header("Authorization", "Bearer t0k3n"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"metadata": {}, "result": {"data": ["Tomatillo"]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = MockAuth::new();
    auth.expect_required().return_const(true);
    auth.expect_authorization()
        .returning(|| Ok(Some("Bearer t0k3n".to_string())));

    let analyser =
        Analyser::new(&fixture_parser(), &options("{}", &server), Box::new(auth)).unwrap();
    let outcome = analyser.analyse_special(CancellationToken::new()).await;

    assert_eq!(outcome.reports.len(), 1);
    assert!(outcome.reports[0].is_success());
}

#[tokio::test]
async fn test_missing_required_authorization() {
    let server = MockServer::start().await;

    let mut auth = MockAuth::new();
    auth.expect_required().return_const(true);
    auth.expect_authorization().returning(|| Ok(None));

    let analyser =
        Analyser::new(&fixture_parser(), &options("{}", &server), Box::new(auth)).unwrap();
    let outcome = analyser.analyse_special(CancellationToken::new()).await;

    assert_eq!(
        outcome.reports[0].error_key(),
        Some(AnalysisReport::AUTHORIZATION)
    );
    assert_eq!(outcome.summary().authorization_failures, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_entity_is_rejected() {
    let server = MockServer::start().await;
    let analyser = Analyser::new(
        &fixture_parser(),
        &options("{}", &server),
        Box::new(NoAuthorization),
    )
    .unwrap();

    let result = analyser
        .analyse_entities(
            &["Study".to_string(), "Trial".to_string()],
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(AnalyserError::Configuration(message)) => assert!(message.contains("Trial")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn test_missing_base_url_is_rejected() {
    let options = OptionsFile::from_yaml("{}").unwrap();
    let result = Analyser::new(&fixture_parser(), &options, Box::new(NoAuthorization));

    assert!(matches!(result, Err(AnalyserError::Configuration(_))));
}
