//! HTTP API for the spine daemon.
//!
//! Provides REST endpoints for:
//! - Workflow execution
//! - Health check
//! - Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use spine_exec::ExecError;

use crate::error::DaemonError;
use crate::metrics::METRICS_CONTENT_TYPE;
use crate::service::{ExecuteOutcome, ExecutionService};

/// Client-supplied idempotency key header.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub service: Arc<ExecutionService>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/execute", post(execute_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Execute a workflow instruction.
///
/// The body is parsed as untyped JSON so that every shape problem is
/// reported by instruction validation with a field-qualified message.
async fn execute_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)))?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .service
        .execute(&payload, idempotency_key)
        .await
        .map_err(to_error_response)?;

    Ok(match outcome {
        ExecuteOutcome::Executed(response) | ExecuteOutcome::Replayed(response) => {
            (StatusCode::OK, Json(response)).into_response()
        }
        ExecuteOutcome::PermissionDenied(denial) => {
            error_response(StatusCode::FORBIDDEN, denial.message()).into_response()
        }
    })
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state.service.metrics().export().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response())
}

// =============================================================================
// Helpers
// =============================================================================

fn error_response(status: StatusCode, error: String) -> ApiError {
    (status, Json(ErrorResponse { error }))
}

fn to_error_response(error: DaemonError) -> ApiError {
    let status = match &error {
        DaemonError::Validation(_) => StatusCode::BAD_REQUEST,
        DaemonError::Exec(ExecError::InvalidPaymentProof(_)) => StatusCode::BAD_REQUEST,
        DaemonError::Exec(ExecError::Facilitator(_)) => StatusCode::BAD_GATEWAY,
        DaemonError::Exec(ExecError::Settlement(_)) => StatusCode::BAD_GATEWAY,
        DaemonError::IdempotencyConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(error = %error, "Execute request failed");
    }

    error_response(status, error.to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use spine_eventlog::{AuditLedger, MemoryJournal};
    use spine_exec::{DelayActionExecutor, Engine, MockSettlement, SettlementAdapter};
    use spine_store::IdempotencyStore;
    use tower::util::ServiceExt;

    use crate::metrics::Metrics;

    fn create_test_app() -> Router {
        let settlement: Arc<dyn SettlementAdapter> = Arc::new(MockSettlement::new(338));
        let engine = Engine::new(
            Arc::new(DelayActionExecutor::default()),
            settlement.clone(),
            AuditLedger::new(Arc::new(MemoryJournal::new())),
        );
        let store = Arc::new(IdempotencyStore::new(Arc::new(MemoryJournal::new())));
        let metrics = Arc::new(Metrics::new().unwrap());

        create_router(Arc::new(ApiState {
            service: Arc::new(ExecutionService::new(engine, settlement, store, metrics)),
        }))
    }

    fn execute_request(body: &Value, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/execute")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = create_test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/execute")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_validation_error_names_the_field() {
        let app = create_test_app();
        let payload = json!({
            "workflowId": "wf-1",
            "agentId": "a1",
            "steps": [],
            "settlement": {
                "token": "USDC",
                "amount": "1.00",
                "recipient": "0xabc",
                "chainId": 338
            }
        });

        let response = app.oneshot(execute_request(&payload, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("steps"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_content_type() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            METRICS_CONTENT_TYPE
        );
    }
}
