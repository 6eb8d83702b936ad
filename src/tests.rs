//! End-to-end tests of the HTTP surface against the in-memory key store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::app;
use crate::config::AuthSettings;
use crate::error::AppError;
use crate::handlers::auth::ValidateResponse;
use crate::handlers::health::HealthResponse;
use crate::models::api_key::{
    ApiKey, ApiKeyListResponse, ApiKeyResponse, BootstrapResponse, CreateApiKeyResponse,
    NewApiKey, Permissions, RevokeApiKeyResponse, UpdateApiKeyRequest,
};
use crate::services::bootstrap_service::AuthStatus;
use crate::state::AppState;
use crate::store::{ApiKeyStore, InMemoryApiKeyStore};

const SECRET: &str = "test-bootstrap-secret";

fn test_settings() -> AuthSettings {
    AuthSettings {
        enabled: true,
        bootstrap_secret: Some(SECRET.to_string()),
        bcrypt_cost: 4,
        store_timeout: Duration::from_secs(5),
    }
}

fn test_server_with(store: Arc<dyn ApiKeyStore>, settings: AuthSettings) -> TestServer {
    TestServer::new(app(AppState::new(store, settings))).unwrap()
}

fn test_server() -> (TestServer, Arc<InMemoryApiKeyStore>) {
    let store = Arc::new(InMemoryApiKeyStore::new());
    let server = test_server_with(store.clone(), test_settings());
    (server, store)
}

fn bearer(key: &str) -> String {
    format!("Bearer {key}")
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

async fn bootstrap_admin(server: &TestServer) -> BootstrapResponse {
    let response = server
        .post("/api/auth/bootstrap")
        .json(&json!({ "bootstrap_secret": SECRET, "key_name": "Admin" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<BootstrapResponse>()
}

async fn create_key(server: &TestServer, admin_key: &str, body: Value) -> CreateApiKeyResponse {
    let response = server
        .post("/api/auth/keys")
        .add_header("Authorization", bearer(admin_key))
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<CreateApiKeyResponse>()
}

#[tokio::test]
async fn public_endpoints_need_no_credentials() {
    let (server, _store) = test_server();

    for path in ["/", "/health", "/api/health", "/api/auth/status"] {
        let response = server.get(path).await;
        response.assert_status_ok();
    }

    let health: HealthResponse = server.get("/health").await.json();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn protected_endpoint_without_header_is_missing_auth_header() {
    let (server, _store) = test_server();

    let response = server.get("/api/auth/keys").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "missing_auth_header");
}

#[tokio::test]
async fn token_scheme_is_invalid_format_not_invalid_key() {
    let (server, _store) = test_server();
    bootstrap_admin(&server).await;

    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", "Token abc123")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_auth_format");
}

#[tokio::test]
async fn unknown_key_is_invalid_api_key() {
    let (server, _store) = test_server();
    bootstrap_admin(&server).await;

    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer("ak_0000_not-a-real-key"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_api_key");
}

#[tokio::test]
async fn bootstrap_flow_and_status() {
    let (server, store) = test_server();

    let status: AuthStatus = server.get("/api/auth/status").await.json();
    assert!(status.authentication_enabled);
    assert!(!status.has_api_keys);
    assert!(status.bootstrap_available);

    let admin = bootstrap_admin(&server).await;
    assert_eq!(admin.key_name, "Admin");
    assert!(admin.api_key.starts_with(&admin.prefix));

    let status: AuthStatus = server.get("/api/auth/status").await.json();
    assert!(status.has_api_keys);
    assert!(!status.bootstrap_available);

    // Correct secret or not, a second bootstrap is refused
    for secret in [SECRET, "wrong"] {
        let response = server
            .post("/api/auth/bootstrap")
            .json(&json!({ "bootstrap_secret": secret, "key_name": "Y" }))
            .await;
        let body = response.json::<Value>();
        if secret == SECRET {
            response.assert_status(StatusCode::FORBIDDEN);
            assert_eq!(error_code(&body), "bootstrap_already_complete");
        } else {
            response.assert_status(StatusCode::UNAUTHORIZED);
            assert_eq!(error_code(&body), "invalid_bootstrap_secret");
        }
    }
    assert_eq!(store.list(true).await.unwrap().len(), 1);

    let validated: ValidateResponse = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    assert!(validated.valid);
    assert_eq!(validated.identity.id, admin.id);
    assert_eq!(validated.identity.permissions, Permissions::full());

    let raw: Value = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    assert_eq!(raw["valid"], json!(true));
    assert_eq!(raw["id"], json!(admin.id));
    assert_eq!(raw["name"], json!("Admin"));
    assert_eq!(raw["permissions"]["admin"], json!(true));
}

#[tokio::test]
async fn bootstrap_with_wrong_secret_creates_nothing() {
    let (server, store) = test_server();

    let response = server
        .post("/api/auth/bootstrap")
        .json(&json!({ "bootstrap_secret": "nope" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(store.list(true).await.unwrap().len(), 0);

    let status: AuthStatus = server.get("/api/auth/status").await.json();
    assert!(status.bootstrap_available);
}

#[tokio::test]
async fn bootstrap_without_configured_secret_is_unavailable() {
    let store = Arc::new(InMemoryApiKeyStore::new());
    let settings = AuthSettings {
        bootstrap_secret: None,
        ..test_settings()
    };
    let server = test_server_with(store, settings);

    let response = server
        .post("/api/auth/bootstrap")
        .json(&json!({ "bootstrap_secret": "" }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&response.json::<Value>()), "bootstrap_not_configured");

    let status: AuthStatus = server.get("/api/auth/status").await.json();
    assert!(!status.bootstrap_available);
}

#[tokio::test]
async fn admin_creates_lists_and_revokes_key() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;

    let b = create_key(
        &server,
        &admin.api_key,
        json!({ "name": "B", "permissions": { "read": true, "write": true, "admin": false } }),
    )
    .await;
    assert_eq!(b.name, "B");
    assert!(!b.permissions.admin);
    assert_eq!(b.metadata["created_by"], json!(admin.id.to_string()));

    let active: ApiKeyListResponse = server
        .get("/api/auth/keys")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    assert_eq!(active.total, 2);
    assert_eq!(active.keys[0].id, b.id);

    let revoked: RevokeApiKeyResponse = server
        .delete(&format!("/api/auth/keys/{}", b.id))
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    assert!(revoked.revoked);

    let active: ApiKeyListResponse = server
        .get("/api/auth/keys")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    assert!(active.keys.iter().all(|k| k.id != b.id));

    let all: ApiKeyListResponse = server
        .get("/api/auth/keys")
        .add_query_param("include_inactive", true)
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .json();
    let listed_b = all.keys.iter().find(|k| k.id == b.id).unwrap();
    assert!(!listed_b.is_active);

    // The revoked key no longer authenticates
    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer(&b.api_key))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_api_key");
}

#[tokio::test]
async fn responses_never_contain_hashes() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;

    let listing = server
        .get("/api/auth/keys")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .text();
    assert!(!listing.contains("key_hash"));
    assert!(!listing.contains("$2b$"));
    assert!(!listing.contains(&admin.api_key));

    let single = server
        .get(&format!("/api/auth/keys/{}", admin.id))
        .add_header("Authorization", bearer(&admin.api_key))
        .await;
    single.assert_status_ok();
    let single_text = single.text();
    assert!(!single_text.contains("$2b$"));
    assert!(!single_text.contains(&admin.api_key));
}

#[tokio::test]
async fn non_admin_key_cannot_manage_keys() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;
    let reader = create_key(&server, &admin.api_key, json!({ "name": "reader" })).await;
    assert_eq!(reader.permissions, Permissions::default());

    let response = server
        .post("/api/auth/keys")
        .add_header("Authorization", bearer(&reader.api_key))
        .json(&json!({ "name": "escalated", "permissions": { "admin": true } }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response.json::<Value>()), "insufficient_permissions");

    // Cannot grant itself admin either
    let response = server
        .put(&format!("/api/auth/keys/{}", reader.id))
        .add_header("Authorization", bearer(&reader.api_key))
        .json(&json!({ "permissions": { "read": true, "write": true, "admin": true } }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .delete(&format!("/api/auth/keys/{}", admin.id))
        .add_header("Authorization", bearer(&reader.api_key))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Read access is fine
    let response = server
        .get(&format!("/api/auth/keys/{}", reader.id))
        .add_header("Authorization", bearer(&reader.api_key))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn update_endpoint_validates_patch() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;
    let key = create_key(&server, &admin.api_key, json!({ "name": "svc" })).await;
    let url = format!("/api/auth/keys/{}", key.id);

    let response = server
        .put(&url)
        .add_header("Authorization", bearer(&admin.api_key))
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "no_update_fields");

    for forbidden in [json!({ "key_hash": "x" }), json!({ "is_active": true })] {
        let response = server
            .put(&url)
            .add_header("Authorization", bearer(&admin.api_key))
            .json(&forbidden)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.json::<Value>()), "invalid_request");
    }

    let response = server
        .put(&format!("/api/auth/keys/{}", Uuid::new_v4()))
        .add_header("Authorization", bearer(&admin.api_key))
        .json(&json!({ "name": "ghost" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let updated: ApiKeyResponse = server
        .put(&url)
        .add_header("Authorization", bearer(&admin.api_key))
        .json(&json!({ "key_name": "renamed", "metadata": { "team": "search" } }))
        .await
        .json();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.metadata["team"], json!("search"));
    assert!(updated.metadata.contains_key("created_at_utc"));

    // Renaming does not disturb the credential
    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer(&key.api_key))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn malformed_bodies_get_the_standard_error_body() {
    let (server, store) = test_server();

    let response = server.post("/api/auth/bootstrap").json(&json!({})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_request");
    assert!(!store.has_any().await.unwrap());

    let admin = bootstrap_admin(&server).await;
    let response = server
        .post("/api/auth/keys")
        .add_header("Authorization", bearer(&admin.api_key))
        .json(&json!({ "permissions": { "read": true } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(error_code(&body), "invalid_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("name"));
    assert_eq!(store.list(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_uuid_key_id_is_invalid_request() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;
    let url = "/api/auth/keys/not-a-uuid";

    let responses = [
        server
            .get(url)
            .add_header("Authorization", bearer(&admin.api_key))
            .await,
        server
            .put(url)
            .add_header("Authorization", bearer(&admin.api_key))
            .json(&json!({ "name": "x" }))
            .await,
        server
            .delete(url)
            .add_header("Authorization", bearer(&admin.api_key))
            .await,
    ];
    for response in responses {
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.json::<Value>()), "invalid_request");
    }
}

#[tokio::test]
async fn internal_namespace_root_skips_the_gate() {
    let (server, _store) = test_server();
    bootstrap_admin(&server).await;

    // No route lives there, but the gate must not answer first
    for path in ["/internal", "/internal/anything"] {
        server.get(path).await.assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn revoking_twice_succeeds_and_unknown_key_is_not_found() {
    let (server, _store) = test_server();
    let admin = bootstrap_admin(&server).await;
    let key = create_key(&server, &admin.api_key, json!({ "name": "svc" })).await;
    let url = format!("/api/auth/keys/{}", key.id);

    for _ in 0..2 {
        server
            .delete(&url)
            .add_header("Authorization", bearer(&admin.api_key))
            .await
            .assert_status_ok();
    }

    let response = server
        .delete(&format!("/api/auth/keys/{}", Uuid::new_v4()))
        .add_header("Authorization", bearer(&admin.api_key))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json::<Value>()), "key_not_found");

    let response = server
        .get(&format!("/api/auth/keys/{}", Uuid::new_v4()))
        .add_header("Authorization", bearer(&admin.api_key))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn successful_request_records_last_used() {
    let (server, store) = test_server();
    let admin = bootstrap_admin(&server).await;
    assert!(store.get(admin.id).await.unwrap().unwrap().last_used_at.is_none());

    server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer(&admin.api_key))
        .await
        .assert_status_ok();

    // The update runs detached from the response
    let mut recorded = false;
    for _ in 0..100 {
        if store.get(admin.id).await.unwrap().unwrap().last_used_at.is_some() {
            recorded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(recorded);
}

#[tokio::test]
async fn disabled_gate_lets_requests_through_without_identity() {
    let store = Arc::new(InMemoryApiKeyStore::new());
    let settings = AuthSettings {
        enabled: false,
        ..test_settings()
    };
    let server = test_server_with(store, settings);

    let status: AuthStatus = server.get("/api/auth/status").await.json();
    assert!(!status.authentication_enabled);

    // The gate did not reject, but the handler still needs an identity
    let response = server.get("/api/auth/keys").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "authentication_required");
}

/// Store whose every operation fails, optionally after a delay.
struct BrokenStore {
    delay: Duration,
}

impl BrokenStore {
    async fn fail<T>(&self) -> Result<T, AppError> {
        tokio::time::sleep(self.delay).await;
        Err(AppError::Internal("connection refused by db-primary".to_string()))
    }
}

#[async_trait]
impl ApiKeyStore for BrokenStore {
    async fn insert(&self, _key: NewApiKey) -> Result<ApiKey, AppError> {
        self.fail().await
    }

    async fn insert_first(&self, _key: NewApiKey) -> Result<Option<ApiKey>, AppError> {
        self.fail().await
    }

    async fn list_active(&self) -> Result<Vec<ApiKey>, AppError> {
        self.fail().await
    }

    async fn list(&self, _include_inactive: bool) -> Result<Vec<ApiKey>, AppError> {
        self.fail().await
    }

    async fn get(&self, _id: Uuid) -> Result<Option<ApiKey>, AppError> {
        self.fail().await
    }

    async fn update(
        &self,
        _id: Uuid,
        _patch: UpdateApiKeyRequest,
    ) -> Result<Option<ApiKey>, AppError> {
        self.fail().await
    }

    async fn deactivate(&self, _id: Uuid) -> Result<bool, AppError> {
        self.fail().await
    }

    async fn has_any(&self) -> Result<bool, AppError> {
        self.fail().await
    }

    async fn touch_last_used(&self, _id: Uuid, _at: DateTime<Utc>) -> Result<(), AppError> {
        self.fail().await
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.fail().await
    }
}

#[tokio::test]
async fn store_failure_during_validation_fails_closed() {
    let store = Arc::new(BrokenStore {
        delay: Duration::ZERO,
    });
    let server = test_server_with(store, test_settings());

    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer("ak_ABCD_anything"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_api_key");
}

#[tokio::test]
async fn slow_store_times_out_as_invalid_key() {
    let store = Arc::new(BrokenStore {
        delay: Duration::from_secs(2),
    });
    let settings = AuthSettings {
        store_timeout: Duration::from_millis(20),
        ..test_settings()
    };
    let server = test_server_with(store, settings);

    let response = server
        .get("/api/auth/validate")
        .add_header("Authorization", bearer("ak_ABCD_anything"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json::<Value>()), "invalid_api_key");
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let store = Arc::new(BrokenStore {
        delay: Duration::ZERO,
    });
    let server = test_server_with(store, test_settings());

    let response = server.get("/api/auth/status").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.json::<Value>();
    assert_eq!(error_code(&body), "internal_auth_error");
    assert!(!body.to_string().contains("db-primary"));
}
