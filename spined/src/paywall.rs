//! Payment gate for host routes.
//!
//! Wraps any axum route so the handler only runs once a spine daemon has
//! executed and settled a payment workflow for the request. Clients send the
//! x402 payment header and requirements as request headers; the gate turns
//! them into a one-step instruction, posts it to `/execute`, and answers
//! `402 Payment Required` when the payment is missing or refused.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use std::sync::Arc;
//! use spined::paywall::{require_payment, Paywall, PaywallPrice};
//!
//! let paywall = Arc::new(Paywall::new(
//!     "http://localhost:4000",
//!     PaywallPrice::usdc("0.10", "0xabc", 338),
//! ));
//! let app: Router = Router::new()
//!     .route("/report", get(|| async { "paid content" }))
//!     .layer(middleware::from_fn_with_state(paywall, require_payment));
//! ```

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use spine_domain::{ExecutionStatus, SettlementResult, DEFAULT_X402_VERSION};

use crate::api::{ErrorResponse, IDEMPOTENCY_KEY_HEADER};

// =============================================================================
// Constants
// =============================================================================

/// Default spine daemon address
pub const DEFAULT_SPINE_URL: &str = "http://localhost:4000";

/// Header carrying the encoded x402 payment
pub const PAYMENT_HEADER: &str = "x-payment-header";

/// Header carrying the JSON payment requirements
pub const PAYMENT_REQUIREMENTS_HEADER: &str = "x-payment-requirements";

const DEFAULT_AGENT_ID: &str = "agent-http";

const EXECUTE_TIMEOUT_SECS: u64 = 30;

/// Longest path fragment kept in a generated action name
const MAX_ACTION_PATH_LEN: usize = 80;

// =============================================================================
// Types
// =============================================================================

/// What a gated route costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaywallPrice {
    pub amount: String,
    pub recipient: String,
    pub chain_id: u64,
    pub memo: Option<String>,
}

impl PaywallPrice {
    /// A USDC price without memo.
    pub fn usdc(amount: impl Into<String>, recipient: impl Into<String>, chain_id: u64) -> Self {
        Self {
            amount: amount.into(),
            recipient: recipient.into(),
            chain_id,
            memo: None,
        }
    }
}

/// Execution the gate obtained for a request.
///
/// Inserted into the request extensions before the handler runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidExecution {
    pub workflow_id: String,
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub permission_id: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub settlement: Option<SettlementResult>,
}

/// Why a request was not let through.
#[derive(Debug, Error)]
pub enum PaywallRejection {
    #[error("{0} header is required")]
    MissingHeader(&'static str),

    #[error("x-payment-requirements must be a JSON object: {0}")]
    InvalidRequirements(String),

    /// Spine refused the execution; carries its error message
    #[error("{0}")]
    Declined(String),

    #[error("Payment workflow {0} failed")]
    WorkflowFailed(Uuid),

    #[error("Spine daemon unavailable: {0}")]
    Unavailable(String),
}

impl PaywallRejection {
    fn status(&self) -> StatusCode {
        match self {
            PaywallRejection::Unavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::PAYMENT_REQUIRED,
        }
    }
}

impl IntoResponse for PaywallRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

// =============================================================================
// Paywall
// =============================================================================

/// Client side of the payment gate.
#[derive(Debug, Clone)]
pub struct Paywall {
    client: Client,
    spine_url: String,
    price: PaywallPrice,
    agent_id: String,
    request_timeout: Duration,
}

impl Paywall {
    /// Create a gate charging `price` through the daemon at `spine_url`.
    pub fn new(spine_url: impl Into<String>, price: PaywallPrice) -> Self {
        let spine_url: String = spine_url.into();
        Self {
            client: Client::new(),
            spine_url: spine_url.trim_end_matches('/').to_string(),
            price,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            request_timeout: Duration::from_secs(EXECUTE_TIMEOUT_SECS),
        }
    }

    /// Agent id reported in generated instructions.
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Deadline for the `/execute` call.
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Execute the payment workflow for one incoming request.
    ///
    /// A client `Idempotency-Key` header is forwarded and also names the
    /// workflow, so a retry replays the first payment. Without one, every
    /// request gets a fresh workflow keyed by its id, method and path.
    pub async fn authorize(
        &self,
        method: &str,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<PaidExecution, PaywallRejection> {
        let payment_header = required_header(headers, PAYMENT_HEADER)?;
        let requirements: Value =
            serde_json::from_str(required_header(headers, PAYMENT_REQUIREMENTS_HEADER)?)
                .map_err(|e| PaywallRejection::InvalidRequirements(e.to_string()))?;
        if !requirements.is_object() {
            return Err(PaywallRejection::InvalidRequirements(
                "expected an object".to_string(),
            ));
        }

        // A retried client key must map to the same workflow to be replayed
        let client_key = headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        let (workflow_id, idempotency_key) = match client_key {
            Some(key) => (format!("wf-{}", key), key.to_string()),
            None => {
                let workflow_id = format!("wf-{}", Uuid::now_v7());
                let key = format!("{}:{}:{}", workflow_id, method, path);
                (workflow_id, key)
            }
        };

        let instruction =
            self.instruction(&workflow_id, method, path, payment_header, requirements);
        debug!(%workflow_id, %idempotency_key, "Requesting paid execution");

        let paid = self.execute(&instruction, &idempotency_key).await?;
        if paid.status == ExecutionStatus::Failed {
            warn!(%workflow_id, execution_id = %paid.execution_id, "Payment workflow failed");
            return Err(PaywallRejection::WorkflowFailed(paid.execution_id));
        }

        info!(%workflow_id, permission_id = %paid.permission_id, "Payment accepted");
        Ok(paid)
    }

    fn instruction(
        &self,
        workflow_id: &str,
        method: &str,
        path: &str,
        payment_header: &str,
        requirements: Value,
    ) -> Value {
        let mut settlement = json!({
            "token": "USDC",
            "amount": self.price.amount,
            "recipient": self.price.recipient,
            "chainId": self.price.chain_id,
            "paymentHeader": payment_header,
            "paymentRequirements": requirements,
            "x402Version": DEFAULT_X402_VERSION,
        });
        if let Some(memo) = &self.price.memo {
            settlement["memo"] = Value::String(memo.clone());
        }

        json!({
            "workflowId": workflow_id,
            "agentId": self.agent_id,
            "steps": [{
                "stepId": "step-handler",
                "type": "action",
                "action": format!("{}-{}", method.to_lowercase(), action_path(path)),
            }],
            "settlement": settlement,
        })
    }

    async fn execute(
        &self,
        instruction: &Value,
        idempotency_key: &str,
    ) -> Result<PaidExecution, PaywallRejection> {
        let request = self
            .client
            .post(format!("{}/execute", self.spine_url))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(instruction)
            .send();

        let response = timeout(self.request_timeout, request)
            .await
            .map_err(|_| PaywallRejection::Unavailable("request timed out".to_string()))?
            .map_err(|e| PaywallRejection::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaywallRejection::Unavailable(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| "x402 execute failed".to_string());
            warn!(status = status.as_u16(), error = %message, "Spine declined payment");
            return Err(PaywallRejection::Declined(message));
        }

        serde_json::from_str(&body).map_err(|e| {
            PaywallRejection::Unavailable(format!("unreadable execute response: {}", e))
        })
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Axum middleware running [`Paywall::authorize`] before the wrapped route.
///
/// Use with `axum::middleware::from_fn_with_state`. The handler can read the
/// [`PaidExecution`] through `Extension`.
pub async fn require_payment(
    State(paywall): State<Arc<Paywall>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    match paywall.authorize(&method, &path, request.headers()).await {
        Ok(paid) => {
            request.extensions_mut().insert(paid);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

fn required_header<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<&'a str, PaywallRejection> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(PaywallRejection::MissingHeader(name))
}

/// Path reduced to word characters and dashes, capped in length.
fn action_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_ACTION_PATH_LEN)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
