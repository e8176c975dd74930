//! Integration tests for the ToolCrib backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::cache::IdCache;
use crate::config::Config;
use crate::engine::TransactionEngine;
use crate::history::HistoryEngine;
use crate::store::{init_database, DocumentStore, SqliteStore};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    /// Fixture with the PSK configured and a client sending the key plus
    /// admin actor headers by default.
    async fn new() -> Self {
        Self::start(true).await
    }

    /// Fixture with the PSK configured and a client sending nothing.
    async fn bare() -> Self {
        Self::start(false).await
    }

    async fn start(send_headers: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool));
        let cache = Arc::new(IdCache::new(store.clone()));
        let engine = Arc::new(TransactionEngine::new(store.clone(), cache.clone()));
        let history = Arc::new(HistoryEngine::new(store.clone(), cache.clone()));

        let config = Config {
            api_psk: Some("test-api-key".to_string()),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            preload_cache: false,
        };

        let state = AppState {
            store,
            cache,
            engine,
            history,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if send_headers {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", "test-api-key".parse().unwrap());
            headers.insert("x-actor-role", "admin".parse().unwrap());
            headers.insert("x-actor-name", "Test Admin".parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_tool(&self, tool_id: &str, name: &str) {
        let resp = self
            .client
            .post(self.url("/api/tools"))
            .json(&json!({ "toolId": tool_id, "name": name, "brand": "Hilti" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "create_tool {}", tool_id);
    }

    async fn create_staff(&self, job_code: &str, display_name: &str) {
        let resp = self
            .client
            .post(self.url("/api/staff"))
            .json(&json!({ "jobCode": job_code, "displayName": display_name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "create_staff {}", job_code);
    }

    async fn check_out(&self, tool_id: &str, job_code: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/transactions/checkout"))
            .json(&json!({ "toolId": tool_id, "jobCode": job_code }))
            .send()
            .await
            .unwrap()
    }

    async fn check_in(&self, tool_id: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/transactions/checkin"))
            .json(&json!({ "toolId": tool_id }))
            .send()
            .await
            .unwrap()
    }

    async fn tool_status(&self, tool_id: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/api/tools/{}/status", tool_id)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn staff(&self, job_code: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/api/staff/{}", job_code)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::bare().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history/today"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::bare().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history/today"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::bare().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history/today"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_role_required() {
    let fixture = TestFixture::new().await;

    // Same PSK, but a worker actor
    let resp = fixture
        .client
        .post(fixture.url("/api/tools"))
        .header("x-actor-role", "worker")
        .json(&json!({ "toolId": "T1", "name": "Drill" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Workers can still run transactions
    fixture.create_tool("T1", "Drill").await;
    fixture.create_staff("W001", "Alice Worker").await;
    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/checkout"))
        .header("x-actor-role", "worker")
        .json(&json!({ "toolId": "T1", "jobCode": "W001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_checkout_checkin_scenario() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1234", "Impact Driver").await;
    fixture.create_staff("W001", "Alice Worker").await;
    fixture.create_staff("W002", "Bob Worker").await;

    // Check out T1234 to W001
    let resp = fixture.check_out("T1234", "W001").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["action"], "checkout");
    assert_eq!(body["data"]["jobCode"], "W001");
    assert_eq!(body["data"]["adminName"], "Test Admin");

    let status = fixture.tool_status("T1234").await;
    assert_eq!(status["data"]["tool"]["status"], "checked_out");
    assert_eq!(status["data"]["canCheckOut"], false);
    assert_eq!(status["data"]["canCheckIn"], true);
    assert_eq!(status["data"]["assignedStaff"]["jobCode"], "W001");

    let staff = fixture.staff("W001").await;
    assert_eq!(staff["data"]["assignedToolIds"], json!(["T1234"]));

    // Second check-out must be rejected and change nothing
    let resp = fixture.check_out("T1234", "W002").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "ALREADY_CHECKED_OUT");

    let status = fixture.tool_status("T1234").await;
    assert_eq!(status["data"]["assignedStaff"]["jobCode"], "W001");
    let staff = fixture.staff("W002").await;
    assert_eq!(staff["data"]["assignedToolIds"], json!([]));

    // Check back in
    let resp = fixture.check_in("T1234").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["action"], "checkin");
    assert_eq!(body["data"]["staffName"], "Alice Worker");

    let status = fixture.tool_status("T1234").await;
    assert_eq!(status["data"]["tool"]["status"], "available");
    assert_eq!(status["data"]["canCheckOut"], true);
    assert!(status["data"]["assignedStaff"].is_null());
    let staff = fixture.staff("W001").await;
    assert_eq!(staff["data"]["assignedToolIds"], json!([]));
}

#[tokio::test]
async fn test_checkin_available_rejected() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;

    let resp = fixture.check_in("T1").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ALREADY_AVAILABLE");
}

#[tokio::test]
async fn test_not_found_errors() {
    let fixture = TestFixture::new().await;
    fixture.create_staff("W001", "Alice").await;

    let resp = fixture.check_out("T404", "W001").await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    fixture.create_tool("T1", "Drill").await;
    let resp = fixture.check_out("T1", "W404").await;
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .get(fixture.url("/api/staff/W404"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_validation_errors() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/checkout"))
        .json(&json!({ "toolId": "", "jobCode": "W001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/batch-checkout"))
        .json(&json!({ "toolIds": [], "jobCode": "W001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // An absurd window is rejected instead of iterating millions of days.
    let resp = fixture
        .client
        .get(fixture.url("/api/history/tool/T1?daysBack=4294967295"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .get(fixture.url("/api/stats/activity?daysBack=50000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_duplicate_tool_rejected() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/tools"))
        .json(&json!({ "toolId": "T1", "name": "Another Drill" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_batch_partial_failure() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("TA", "Drill").await;
    fixture.create_tool("TB", "Saw").await;
    fixture.create_tool("TC", "Grinder").await;
    fixture.create_staff("W001", "Alice").await;
    fixture.create_staff("W002", "Bob").await;

    // TB is already held by Bob
    let resp = fixture.check_out("TB", "W002").await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/batch-checkout"))
        .json(&json!({ "toolIds": ["TA", "TB", "TC"], "jobCode": "W001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["succeeded"], 2);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["results"]["TA"], true);
    assert_eq!(body["data"]["results"]["TB"], false);
    assert_eq!(body["data"]["results"]["TC"], true);
    assert_eq!(body["data"]["errors"].as_array().unwrap().len(), 1);
    let batch_id = body["data"]["batchId"].as_str().unwrap().to_string();

    // Every entry written by the batch carries the shared correlation id
    let resp = fixture
        .client
        .get(fixture.url("/api/history/today"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    let batch_entries: Vec<&Value> = entries
        .iter()
        .filter(|e| e["batchId"] == json!(batch_id))
        .collect();
    assert_eq!(batch_entries.len(), 2);

    // Batch check-in returns the remaining tools
    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/batch-checkin"))
        .json(&json!({ "toolIds": ["TA", "TB", "TC"] }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["succeeded"], 3);
    assert_eq!(body["data"]["failed"], 0);
}

#[tokio::test]
async fn test_history_ordering_newest_first() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;
    fixture.create_staff("W001", "Alice").await;

    fixture.check_out("T1", "W001").await;
    fixture.check_in("T1").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history/today"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "checkin");
    assert_eq!(entries[1]["action"], "checkout");

    // Per-tool history agrees
    let resp = fixture
        .client
        .get(fixture.url("/api/history/tool/T1?daysBack=7"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "checkin");

    // Limit truncates after sorting
    let resp = fixture
        .client
        .get(fixture.url("/api/history/today?limit=1"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "checkin");
}

#[tokio::test]
async fn test_staff_history() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;
    fixture.create_tool("T2", "Saw").await;
    fixture.create_staff("W001", "Alice").await;
    fixture.create_staff("W002", "Bob").await;

    fixture.check_out("T1", "W001").await;
    fixture.check_out("T2", "W002").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history/staff/W001?daysBack=7"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["toolId"], "T1");
    assert_eq!(entries[0]["jobCode"], "W001");
}

#[tokio::test]
async fn test_stats_endpoints() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;
    fixture.create_tool("T2", "Saw").await;
    fixture.create_staff("W001", "Alice").await;
    fixture.create_staff("W002", "Bob").await;

    fixture.check_out("T1", "W001").await;
    fixture.check_out("T2", "W001").await;
    fixture.check_in("T1").await;
    let resp = fixture
        .client
        .post(fixture.url("/api/transactions/checkout"))
        .json(&json!({ "toolId": "T1", "jobCode": "W002" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/api/stats/activity?daysBack=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["checkouts"], 3);
    assert_eq!(body["data"]["checkins"], 1);
    assert_eq!(body["data"]["mostActive"][0]["jobCode"], "W001");
    assert_eq!(body["data"]["mostActive"][0]["count"], 3);

    // Stock report
    for (id, name, qty, min) in [
        ("C1", "Gloves", 0, 5),
        ("C2", "Blades", 3, 5),
        ("C3", "Bits", 20, 5),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/consumables"))
            .json(&json!({
                "consumableId": id,
                "name": name,
                "quantity": qty,
                "minStock": min,
                "maxStock": 50
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = fixture
        .client
        .get(fixture.url("/api/stats/stock"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["outOfStock"][0]["consumableId"], "C1");
    assert_eq!(body["data"]["lowStock"][0]["consumableId"], "C2");
}

#[tokio::test]
async fn test_cache_reload() {
    let fixture = TestFixture::new().await;
    fixture.create_tool("T1", "Drill").await;
    fixture.create_staff("W001", "Alice").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/cache/reload"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["tools"], 1);
    assert_eq!(body["data"]["staff"], 1);

    // Reload requires an admin actor
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/cache/reload"))
        .header("x-actor-role", "worker")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
