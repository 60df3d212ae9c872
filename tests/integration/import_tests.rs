//! End-to-end import runs against a mock Place Details API

use review_importer::config::{Config, Credentials};
use review_importer::importer::{ImportError, Importer};
use review_importer::storage::{
    DocumentStore, RecordField, RunHistoryStore, RunStatus, SqliteStorage,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAILS_PATH: &str = "/maps/api/place/details/json";

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    let mut config = Config::with_database(db_path.to_string_lossy());
    config.google.endpoint = format!("{}{}", server.uri(), DETAILS_PATH);
    config.import.page_delay_ms = 10; // Keep pagination fast in tests
    config.import.request_timeout_secs = 5;
    config
}

fn credentials() -> Credentials {
    Credentials::new("test-key", "place-1")
}

fn open_importer(config: &Config) -> (Importer<SqliteStorage>, Arc<Mutex<SqliteStorage>>) {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .expect("Failed to open DB");
    let storage = Arc::new(Mutex::new(storage));
    let importer =
        Importer::from_config(config, Arc::clone(&storage)).expect("Failed to build importer");
    (importer, storage)
}

/// A Place Details page with the given review texts
fn reviews_page(texts: &[&str], token: Option<&str>) -> ResponseTemplate {
    let reviews: Vec<serde_json::Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            serde_json::json!({
                "author_name": format!("Reviewer {}", i + 1),
                "text": text,
                "rating": 5,
                "time": 1_700_000_000
            })
        })
        .collect();

    let mut body = serde_json::json!({"status": "OK", "result": {"reviews": reviews}});
    if let Some(token) = token {
        body["next_page_token"] = serde_json::json!(token);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_import_persists_reviews_and_records_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("place_id", "place-1"))
        .and(query_param("key", "test-key"))
        .and(query_param("fields", "reviews,next_page_token"))
        .respond_with(reviews_page(&["Great service", "Lovely staff"], None))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("reviews.db");
    let config = create_test_config(&mock_server, &db_path);
    let (importer, storage) = open_importer(&config);

    let imported = importer.run(&credentials()).await.expect("Import failed");
    assert_eq!(imported, 2);
    drop(importer);
    drop(storage);

    // Everything must survive reopening the database
    let storage = SqliteStorage::new(&db_path).expect("Failed to reopen DB");
    assert_eq!(storage.count_records().unwrap(), 2);

    let stored = storage
        .query_by_field_contains(RecordField::Body, "Lovely staff")
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record.title, "Reviewer 2");
    assert_eq!(stored[0].record.date_iso, "2023-11-14");
    assert_eq!(stored[0].record.source, "Google");

    let runs = storage.all_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Success);
    assert_eq!(runs[0].imported_count, 2);
    assert_eq!(
        runs[0].message.as_deref(),
        Some("Successfully imported 2 new reviews")
    );
    assert!(storage.last_import_at().unwrap().is_some());
}

#[tokio::test]
async fn test_pagination_follows_tokens() {
    let mock_server = MockServer::start().await;

    // Token-specific pages are mounted first so they win over the first page
    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("pagetoken", "page-2"))
        .respond_with(reviews_page(&["Great service", "Quick delivery"], Some("page-3")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("pagetoken", "page-3"))
        .respond_with(reviews_page(&["Fair prices"], None))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(reviews_page(&["Great service", "Lovely staff"], Some("page-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    // "Great service" appears on two pages but is stored once
    let imported = importer.run(&credentials()).await.expect("Import failed");
    assert_eq!(imported, 4);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 4);
    assert_eq!(
        storage
            .query_by_field_contains(RecordField::Body, "Great service")
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_second_run_imports_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(reviews_page(&["Great service", "Lovely staff"], None))
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    assert_eq!(importer.run(&credentials()).await.unwrap(), 2);
    assert_eq!(importer.run(&credentials()).await.unwrap(), 0);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 2);

    let runs = storage.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].message.as_deref(), Some("No new reviews found"));
    assert_eq!(runs[0].status, RunStatus::Success);
}

#[tokio::test]
async fn test_http_error_is_recorded_as_connection_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    let result = importer.run(&credentials()).await;
    assert!(matches!(result, Err(ImportError::Transport(_))));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 0);
    let runs = storage.all_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0]
        .message
        .as_deref()
        .unwrap()
        .starts_with("API connection error: HTTP 503"));
    assert_eq!(storage.last_import_at().unwrap(), None);
}

#[tokio::test]
async fn test_failure_on_later_page_discards_earlier_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("pagetoken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "INVALID_REQUEST"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(reviews_page(&["Great service"], Some("page-2")))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    let result = importer.run(&credentials()).await;
    assert!(matches!(result, Err(ImportError::Api(_))));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 0);
    assert_eq!(
        storage.all_runs().unwrap()[0].message.as_deref(),
        Some("API error: INVALID_REQUEST")
    );
}

#[tokio::test]
async fn test_missing_api_key_makes_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(reviews_page(&["Great service"], None))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    let result = importer.run(&Credentials::new("", "place-1")).await;
    assert!(matches!(result, Err(ImportError::ConfigMissing)));

    let runs = storage.lock().unwrap().all_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].message.as_deref().unwrap().contains("not set"));
}

#[tokio::test]
async fn test_place_without_reviews() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "OK", "result": {}})),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    assert_eq!(importer.run(&credentials()).await.unwrap(), 0);

    let storage = storage.lock().unwrap();
    let runs = storage.all_runs().unwrap();
    assert_eq!(runs[0].status, RunStatus::Success);
    assert_eq!(runs[0].message.as_deref(), Some("No reviews found"));
    assert_eq!(storage.last_import_at().unwrap(), None);
}

#[tokio::test]
async fn test_importers_on_one_database_never_overlap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(
            reviews_page(&["Great service"], None).set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));

    // Separate connections, as with a scheduled and a manual process
    let (scheduled, _) = open_importer(&config);
    let (manual, storage) = open_importer(&config);

    let (creds_a, creds_b) = (credentials(), credentials());
    let (a, b) = tokio::join!(scheduled.run(&creds_a), manual.run(&creds_b));

    let (done, rejected) = if a.is_ok() { (a, b) } else { (b, a) };
    assert_eq!(done.unwrap(), 1);
    assert!(matches!(rejected, Err(ImportError::AlreadyRunning)));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 1);

    let runs = storage.all_runs().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs
        .iter()
        .any(|run| run.message.as_deref() == Some("import already in progress")));
}

#[tokio::test]
async fn test_later_page_without_reviews_imports_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("pagetoken", "page-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "OK", "result": {}})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .respond_with(reviews_page(&["Great service"], Some("page-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server, &dir.path().join("reviews.db"));
    let (importer, storage) = open_importer(&config);

    assert_eq!(importer.run(&credentials()).await.unwrap(), 0);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records().unwrap(), 0);
    assert_eq!(
        storage.all_runs().unwrap()[0].message.as_deref(),
        Some("No reviews found")
    );
}
