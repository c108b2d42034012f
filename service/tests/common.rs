//! Common test utilities for payflow integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use payflow_service::{create_router, AppState, ServiceConfig};
use payflow_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and a fast-polling
    /// index consumer. Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            index_poll_interval_ms: 20,
            index_batch_size: 64,
            idempotency_wait_attempts: 20,
            idempotency_wait_delay_ms: 5,
        };

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
        }
    }

    /// Generate a unique user id in the shape external callers use.
    pub fn user_id() -> String {
        format!("it-{}", uuid::Uuid::new_v4())
    }

    /// Generate a unique idempotency key.
    pub fn idem_key() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Create an account for `user_id`, asserting success.
    pub async fn create_account(&self, user_id: &str) {
        self.server
            .post("/payments/account")
            .add_header("x-user-id", user_id)
            .add_header("idempotency-key", Self::idem_key())
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    /// Create an account and top it up to `balance`.
    pub async fn create_funded_account(&self, user_id: &str, balance: i64) {
        self.create_account(user_id).await;
        self.server
            .post("/payments/account/topup")
            .add_header("x-user-id", user_id)
            .add_header("idempotency-key", Self::idem_key())
            .json(&json!({ "amount": balance }))
            .await
            .assert_status_ok();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
