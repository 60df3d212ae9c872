//! API diagnostic and health probe against a mock Place Details API

use review_importer::config::{ClientConfig, Credentials, ImportConfig};
use review_importer::fetcher::{check_api, ApiProbe, CheckFailure, ReqwestFetcher};
use review_importer::output::{HealthReporter, ImportRecency};
use review_importer::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAILS_PATH: &str = "/maps/api/place/details/json";
const TIMEOUT: Duration = Duration::from_secs(5);

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::from_config(&ClientConfig::default(), &ImportConfig::default())
        .expect("Failed to build HTTP client")
}

fn endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), DETAILS_PATH)
}

#[tokio::test]
async fn test_check_api_reports_place() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("fields", "name,rating"))
        .and(header("user-agent", "review-importer/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "result": {"name": "Corner Cafe", "rating": 4.7}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let check = check_api(
        &fetcher(),
        &endpoint(&mock_server),
        &Credentials::new("test-key", "place-1"),
        TIMEOUT,
    )
    .await
    .expect("API check failed");

    assert_eq!(check.place_name, "Corner Cafe");
    assert_eq!(check.rating, Some(4.7));
}

#[tokio::test]
async fn test_check_api_request_denied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&mock_server)
        .await;

    let failure = check_api(
        &fetcher(),
        &endpoint(&mock_server),
        &Credentials::new("bad-key", "place-1"),
        TIMEOUT,
    )
    .await
    .unwrap_err();

    assert_eq!(
        failure.to_string(),
        "API Error: The provided API key is invalid."
    );
    assert!(failure.hint().is_some());
}

#[tokio::test]
async fn test_check_api_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let failure = check_api(
        &fetcher(),
        &endpoint(&mock_server),
        &Credentials::new("test-key", "place-1"),
        TIMEOUT,
    )
    .await
    .unwrap_err();

    assert!(matches!(failure, CheckFailure::Transport(_)));
    assert!(failure.to_string().starts_with("API Connection Error: HTTP 500"));
}

#[tokio::test]
async fn test_health_probe_is_live() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("fields", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "result": {"name": "Corner Cafe"}
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let reporter = HealthReporter::new(
        Arc::new(fetcher()),
        endpoint(&mock_server),
        ImportConfig::default(),
    );
    let storage = SqliteStorage::new_in_memory().expect("Failed to create DB");
    let credentials = Credentials::new("test-key", "place-1");

    // Each snapshot probes the API again
    for _ in 0..2 {
        let snapshot = reporter
            .snapshot(&credentials, Some(&storage as &dyn Storage))
            .await
            .expect("Snapshot failed");
        assert_eq!(snapshot.api, ApiProbe::Reachable);
        assert_eq!(snapshot.last_import, ImportRecency::NeverRun);
        assert!(snapshot.dependency_present);
    }
}

#[tokio::test]
async fn test_health_probe_reports_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota."
        })))
        .mount(&mock_server)
        .await;

    let reporter = HealthReporter::new(
        Arc::new(fetcher()),
        endpoint(&mock_server),
        ImportConfig::default(),
    );
    let snapshot = reporter
        .snapshot(&Credentials::new("test-key", "place-1"), None)
        .await
        .expect("Snapshot failed");

    assert_eq!(
        snapshot.api,
        ApiProbe::Error("You have exceeded your daily request quota.".to_string())
    );
    assert!(!snapshot.is_healthy());
}
