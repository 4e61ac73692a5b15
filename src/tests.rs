//! Integration tests for the bug tracker backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::storage::DocumentStore;
use crate::{create_router, AppState};

const PASSWORD: &str = "Secret#123";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_cache(false).await
    }

    async fn with_cache(cache_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let document_dir = temp_dir.path().join("documents");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let documents = Arc::new(DocumentStore::new(&document_dir));
        documents.init().await.expect("Failed to init storage");

        // Create config
        let config = Config {
            jwt_secret: b"integration-test-secret".to_vec(),
            jwt_secret_generated: false,
            db_path,
            document_dir,
            storage_enabled: true,
            cache_enabled,
            cache_ttl: Duration::from_secs(60),
            token_ttl: Duration::from_secs(15 * 60),
            cors_origins: Vec::new(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            cache: Arc::new(ResponseCache::new(cache_enabled, config.cache_ttl)),
            documents,
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
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::builder().cookie_store(true).build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200, "GET {}", path);
        resp.json().await.unwrap()
    }

    /// Register (and thereby log in) a user. Returns the user id.
    async fn register(&self, username: &str) -> i64 {
        let resp = self
            .post(
                "/api/v1/auth/register",
                json!({"username": username, "password": PASSWORD}),
            )
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_i64().unwrap()
    }

    async fn create_client(&self, name: &str) -> i64 {
        let resp = self
            .post("/api/v1/projects/clients", json!({"name": name}))
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_i64().unwrap()
    }

    async fn create_project(&self, name: &str, client_id: i64) -> i64 {
        let resp = self
            .post(
                "/api/v1/projects",
                json!({"name": name, "clientId": client_id}),
            )
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_i64().unwrap()
    }

    async fn create_bug(&self, project_id: i64, content: &str) -> Value {
        let resp = self
            .post(
                "/api/v1/projects/bugs",
                json!({"projectId": project_id, "content": content}),
            )
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
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
    assert!(resp.headers().contains_key("x-process-time"));
    assert_eq!(resp.headers()["x-route-name"], "/health");
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post(
            "/api/v1/auth/register",
            json!({"username": "alice", "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let cookie = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["isAuthenticated"], true);

    // The cookie alone authenticates a login with no body
    let resp = fixture
        .client
        .post(fixture.url("/api/v1/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;

    let resp = fixture
        .post(
            "/api/v1/auth/register",
            json!({"username": "alice", "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status(), 409);

    let resp = fixture
        .post(
            "/api/v1/auth/register",
            json!({"username": "bob", "password": "weak"}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_without_credentials() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/v1/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Not Authenticated");
}

#[tokio::test]
async fn test_login_with_credentials() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;

    // A fresh client has no cookie
    let client = Client::builder().cookie_store(true).build().unwrap();

    let resp = client
        .post(fixture.url("/api/v1/auth/login"))
        .json(&json!({"username": "alice", "password": "Wrong#123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(fixture.url("/api/v1/auth/login"))
        .json(&json!({"username": "alice", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("set-cookie"));

    let resp = client
        .post(fixture.url("/api/v1/projects/clients"))
        .json(&json!({"name": "Acme"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_login_required_routes_return_forbidden() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post("/api/v1/projects/clients", json!({"name": "Acme"}))
        .await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let resp = fixture
        .post("/api/v1/projects", json!({"name": "Apollo", "clientId": 1}))
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_invalid_cookie_is_unauthorized() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/v1/projects"))
        .header("cookie", "token=not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Logout still succeeds with a bad cookie
    let resp = fixture
        .client
        .post(fixture.url("/api/v1/auth/logout"))
        .header("cookie", "token=not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/v1/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let resp = fixture
        .post("/api/v1/projects/clients", json!({"name": "Acme"}))
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_project_update_is_audited() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let globex = fixture.create_client("Globex").await;
    let project_id = fixture.create_project("Apollo", acme).await;

    // Creation leaves no history
    let body = fixture
        .get_json(&format!(
            "/api/v1/projects/audit_trails?object_class=Project&object_id={}",
            project_id
        ))
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let resp = fixture
        .post(
            "/api/v1/projects",
            json!({
                "id": project_id,
                "name": "Apollo II",
                "status": "Open",
                "priority": "Low",
                "clientId": globex,
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Apollo II");
    assert_eq!(body["data"]["client"]["name"], "Globex");

    let body = fixture
        .get_json(&format!(
            "/api/v1/projects/audit_trails?object_class=Project&object_id={}",
            project_id
        ))
        .await;
    let comments: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["objectComment"].as_str().unwrap())
        .collect();
    assert!(comments.contains(&"Name changed from 'Apollo' to 'Apollo II'"));
    assert!(comments.contains(&"Client changed from 'Acme' to 'Globex'"));
    assert!(comments.contains(&"Priority changed from 'High' to 'Low'"));
    assert!(!comments.iter().any(|c| c.starts_with("Status")));

    let entry = &body["data"][0];
    assert_eq!(entry["objectClass"], "Project");
    assert_eq!(entry["objectId"], project_id);
}

#[tokio::test]
async fn test_update_missing_project_is_not_found() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;

    let resp = fixture
        .post(
            "/api/v1/projects",
            json!({"id": 999, "name": "Ghost", "clientId": acme}),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_bug_allocation_and_bulk_close() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;

    let first = fixture.create_bug(project_id, "Crash on start").await;
    let second = fixture.create_bug(project_id, "Typo in footer").await;
    let first_id = first["id"].as_i64().unwrap();
    let second_id = second["id"].as_i64().unwrap();
    assert_eq!(first["owner"]["username"], "alice");

    let resp = fixture
        .post(
            "/api/v1/projects/bugs",
            json!({
                "id": first_id,
                "projectId": project_id,
                "content": "Crash on start",
                "allocatedToIds": [alice],
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allocatedTo"][0]["username"], "alice");

    let resp = fixture
        .client
        .delete(fixture.url("/api/v1/projects/bugs"))
        .json(&json!({"ids": [first_id, second_id]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["closed"], json!([first_id, second_id]));

    // Closing again transitions nothing
    let resp = fixture
        .client
        .delete(fixture.url("/api/v1/projects/bugs"))
        .json(&json!({"ids": [first_id]}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["closed"], json!([]));

    let body = fixture
        .get_json(&format!(
            "/api/v1/projects/audit_trails?object_class=Bug&object_id={}",
            first_id
        ))
        .await;
    let comments: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["objectComment"].as_str().unwrap())
        .collect();
    assert_eq!(
        comments,
        vec![
            "Allocated To changed from 'Nobody' to 'alice'",
            "Status changed from 'Open' to 'Closed'",
        ]
    );
}

#[tokio::test]
async fn test_threads_and_replies() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;
    let bug_id = fixture.create_bug(project_id, "Crash").await["id"]
        .as_i64()
        .unwrap();

    let resp = fixture
        .post("/api/v1/projects/comments", json!({"content": "Seen it too"}))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post(
            "/api/v1/projects/threads",
            json!({"content": "Root cause?", "bugId": bug_id}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let thread_id = body["data"]["id"].as_i64().unwrap();

    let resp = fixture
        .post(
            "/api/v1/projects/threads/replies",
            json!({"threadId": thread_id, "content": "Null config"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body = fixture
        .get_json(&format!("/api/v1/projects/bugs/threads?bug_id={}", bug_id))
        .await;
    assert_eq!(body["data"][0]["content"], "Root cause?");

    let body = fixture
        .get_json(&format!(
            "/api/v1/projects/threads/replies?thread_id={}",
            thread_id
        ))
        .await;
    assert_eq!(body["data"][0]["author"]["username"], "alice");
}

#[tokio::test]
async fn test_badge_attach_is_audited() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;

    let resp = fixture
        .post(
            "/api/v1/projects/badges",
            json!({"objectId": project_id, "objectType": "Project", "label": "urgent"}),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let body = fixture.get_json("/api/v1/projects/badges").await;
    assert_eq!(body["data"][0]["label"], "urgent");

    let body = fixture
        .get_json(&format!("/api/v1/projects?project_id={}", project_id))
        .await;
    assert_eq!(body["data"]["badges"][0]["label"], "urgent");

    let body = fixture
        .get_json("/api/v1/projects/audit_trails?object_class=all")
        .await;
    assert_eq!(
        body["data"][0]["objectComment"],
        "Badges changed from 'No badges' to 'urgent'"
    );
}

#[tokio::test]
async fn test_document_upload() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;

    let part = reqwest::multipart::Part::bytes(b"hello".to_vec()).file_name("notes.txt");
    let form = reqwest::multipart::Form::new().part("document", part);
    let resp = fixture
        .client
        .post(fixture.url(&format!(
            "/api/v1/projects/documents/upload?category=Project&category_id={}",
            project_id
        )))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["originalName"], "notes.txt");
    let public_path = body["data"]["publicPath"].as_str().unwrap().to_string();
    assert!(public_path.starts_with("/public/project/"));
    assert!(public_path.ends_with(".txt"));

    let resp = fixture
        .client
        .get(fixture.url(&public_path))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_project_listing_cache_is_invalidated_by_writes() {
    let fixture = TestFixture::with_cache(true).await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;

    let body = fixture.get_json("/api/v1/projects").await;
    assert!(body["data"].as_array().unwrap().is_empty());

    fixture.create_project("Apollo", acme).await;

    let body = fixture.get_json("/api/v1/projects").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["bugCount"], 0);
}

#[tokio::test]
async fn test_delete_projects() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/v1/projects"))
        .json(&json!({"ids": [project_id]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["deleted"], 1);

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/v1/projects?project_id={}", project_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_save_bug_reports_ignored_ids() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let acme = fixture.create_client("Acme").await;
    let project_id = fixture.create_project("Apollo", acme).await;
    let bug = fixture.create_bug(project_id, "Crash").await;
    assert_eq!(bug["ignoredIds"], json!([]));

    let resp = fixture
        .post(
            "/api/v1/projects/bugs",
            json!({
                "id": bug["id"],
                "projectId": project_id,
                "content": "Crash",
                "allocatedToIds": [alice, 999999],
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["ignoredIds"], json!([999999]));
    assert_eq!(body["data"]["allocatedTo"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["allocatedTo"][0]["username"], "alice");
}
