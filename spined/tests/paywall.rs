//! Payment gate in front of a host route, backed by a live spine server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

use spine_eventlog::{AuditLedger, MemoryJournal};
use spine_exec::{ActionExecutor, Engine, MockSettlement, SettlementAdapter};
use spine_store::IdempotencyStore;
use spine_testkit::ScriptedExecutor;
use spined::paywall::{PAYMENT_HEADER, PAYMENT_REQUIREMENTS_HEADER};
use spined::{
    create_router, require_payment, ApiState, ExecutionService, Metrics, PaidExecution, Paywall,
    PaywallPrice, IDEMPOTENCY_KEY_HEADER,
};

const TESTNET_REQUIREMENTS: &str = r#"{"scheme":"exact","network":"cronos-testnet"}"#;

/// Start a mock-mode spine daemon on an ephemeral port.
async fn spawn_spine(actions: Arc<dyn ActionExecutor>) -> anyhow::Result<String> {
    let settlement: Arc<dyn SettlementAdapter> = Arc::new(MockSettlement::new(338));
    let ledger = AuditLedger::new(Arc::new(MemoryJournal::new()));
    let engine = Engine::new(actions, settlement.clone(), ledger);
    let store = Arc::new(IdempotencyStore::new(Arc::new(MemoryJournal::new())));
    let service = ExecutionService::new(engine, settlement, store, Arc::new(Metrics::new()?));
    let app = create_router(Arc::new(ApiState {
        service: Arc::new(service),
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

/// Host app with one gated route counting handler calls.
fn gated_app(spine_url: &str, served: Arc<AtomicUsize>) -> Router {
    let paywall = Arc::new(Paywall::new(spine_url, PaywallPrice::usdc("0.10", "0xabc", 338)));

    Router::new()
        .route(
            "/report",
            get(move |Extension(paid): Extension<PaidExecution>| {
                let served = served.clone();
                async move {
                    served.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "report": "quarterly",
                        "workflowId": paid.workflow_id,
                        "executionId": paid.execution_id,
                        "permissionId": paid.permission_id,
                        "txHash": paid.settlement.map(|s| s.tx_hash),
                    }))
                }
            }),
        )
        .layer(middleware::from_fn_with_state(paywall, require_payment))
}

async fn get_report(
    app: &Router,
    requirements: Option<&str>,
    key: Option<&str>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut builder = Request::builder()
        .uri("/report")
        .header(PAYMENT_HEADER, "header-abc");
    if let Some(requirements) = requirements {
        builder = builder.header(PAYMENT_REQUIREMENTS_HEADER, requirements);
    }
    if let Some(key) = key {
        builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
    }

    let response = app.clone().oneshot(builder.body(Body::empty())?).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn paid_request_reaches_the_handler() -> anyhow::Result<()> {
    let spine = spawn_spine(Arc::new(ScriptedExecutor::succeeding())).await?;
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app(&spine, served.clone());

    let (status, body) = get_report(&app, Some(TESTNET_REQUIREMENTS), None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"], "quarterly");
    assert!(body["workflowId"].as_str().unwrap_or_default().starts_with("wf-"));
    assert!(body["permissionId"].as_str().unwrap_or_default().starts_with("mock-wf-"));
    assert!(body["txHash"].as_str().unwrap_or_default().starts_with("0x"));
    assert_eq!(served.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn missing_requirements_is_payment_required() -> anyhow::Result<()> {
    let spine = spawn_spine(Arc::new(ScriptedExecutor::succeeding())).await?;
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app(&spine, served.clone());

    let (status, body) = get_report(&app, None, None).await?;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "x-payment-requirements header is required");
    assert_eq!(served.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn refused_proof_is_payment_required_with_spine_error() -> anyhow::Result<()> {
    let spine = spawn_spine(Arc::new(ScriptedExecutor::succeeding())).await?;
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app(&spine, served.clone());

    // Mainnet requirements against a testnet daemon
    let requirements = r#"{"scheme":"exact","network":"cronos"}"#;
    let (status, body) = get_report(&app, Some(requirements), None).await?;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("paymentRequirements.network"));
    assert_eq!(served.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn failed_workflow_is_payment_required() -> anyhow::Result<()> {
    let spine = spawn_spine(Arc::new(ScriptedExecutor::always_failing())).await?;
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app(&spine, served.clone());

    let (status, body) = get_report(&app, Some(TESTNET_REQUIREMENTS), None).await?;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Payment workflow"));
    assert_eq!(served.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn client_key_replays_the_first_payment() -> anyhow::Result<()> {
    let actions = Arc::new(ScriptedExecutor::succeeding());
    let spine = spawn_spine(actions.clone()).await?;
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app(&spine, served.clone());

    let (_, first) = get_report(&app, Some(TESTNET_REQUIREMENTS), Some("order-42")).await?;
    let (status, second) = get_report(&app, Some(TESTNET_REQUIREMENTS), Some("order-42")).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["workflowId"], "wf-order-42");
    assert_eq!(first["executionId"], second["executionId"]);
    assert_eq!(actions.calls(), 1);
    assert_eq!(served.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn unreachable_spine_is_bad_gateway() -> anyhow::Result<()> {
    let served = Arc::new(AtomicUsize::new(0));
    let app = gated_app("http://127.0.0.1:9", served.clone());

    let (status, _) = get_report(&app, Some(TESTNET_REQUIREMENTS), None).await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(served.load(Ordering::SeqCst), 0);
    Ok(())
}
