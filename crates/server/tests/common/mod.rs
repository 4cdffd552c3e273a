//! Common test utilities for E2E testing.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a temporary SQLite database seeded with a small shop: two
//! orders, one employee and three machines.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use laundry_core::config::{DatabaseConfig, ServerConfig, WorkflowConfig};
use laundry_core::workflow::{Employee, Locale, MachineType, Order};
use laundry_core::{create_audit_system, AuditStore, Config, SqliteAuditStore, SqliteWorkflow};

pub const ORDER_ID: i64 = 10;
pub const OTHER_ORDER_ID: i64 = 11;
pub const EMPLOYEE_ID: i64 = 5;
pub const WASHER_ID: i64 = 1;
pub const DRYER_ID: i64 = 2;
pub const SECOND_WASHER_ID: i64 = 3;

/// Test fixture for E2E testing against the in-process router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_pickup_queue_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/pickup-queue", json!({
///         "order_id": 10,
///         "time_slot_id": 3
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom workflow settings.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            workflow: WorkflowConfig {
                locale: test_config.locale,
                require_drying: test_config.require_drying,
            },
            ..Default::default()
        };

        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let workflow = SqliteWorkflow::new(&db_path)
            .expect("Failed to create workflow")
            .with_policy(config.workflow.policy())
            .with_audit(audit_handle);

        seed(&workflow);

        let state = Arc::new(laundry_server::state::AppState::new(
            config,
            Arc::new(workflow),
            audit_store,
        ));

        let router = laundry_server::api::create_router(state);

        Self { router, temp_dir }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a PATCH request without a body.
    pub async fn patch_empty(&self, path: &str) -> TestResponse {
        self.request("PATCH", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch raw text (for the Prometheus endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll the audit endpoint until at least `expected` events match `query`.
    pub async fn wait_for_audit(&self, query: &str, expected: i64) -> TestResponse {
        let path = format!("/api/v1/audit?{}", query);
        let mut response = self.get(&path).await;
        for _ in 0..50 {
            if response.body["total"].as_i64().unwrap_or(0) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            response = self.get(&path).await;
        }
        response
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

fn seed(workflow: &SqliteWorkflow) {
    for (id, address) in [(ORDER_ID, "12 Soi Ari"), (OTHER_ORDER_ID, "88 Sukhumvit")] {
        workflow
            .register_order(&Order {
                id,
                customer_id: 100 + id,
                address: address.to_string(),
            })
            .unwrap();
    }
    workflow
        .register_employee(&Employee {
            id: EMPLOYEE_ID,
            name: "Somchai".to_string(),
        })
        .unwrap();
    workflow
        .register_machine(WASHER_ID, MachineType::Washing)
        .unwrap();
    workflow
        .register_machine(DRYER_ID, MachineType::Drying)
        .unwrap();
    workflow
        .register_machine(SECOND_WASHER_ID, MachineType::Washing)
        .unwrap();
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub locale: Locale,
    pub require_drying: bool,
}

impl TestConfig {
    pub fn thai() -> Self {
        Self {
            locale: Locale::Th,
            ..Default::default()
        }
    }

    pub fn require_drying() -> Self {
        Self {
            require_drying: true,
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
