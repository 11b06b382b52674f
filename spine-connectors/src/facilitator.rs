//! x402 Facilitator REST Client
//!
//! Provides REST integration for:
//! - Verifying a payment header against its payment requirements
//! - Submitting a verified payment for on-chain settlement
//!
//! # Protocol
//!
//! Both calls POST the same JSON body (`x402Version`, `paymentHeader`,
//! `paymentRequirements`) and carry the protocol version in the
//! `X402-Version` header.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use spine_domain::VerifyRequest;

// =============================================================================
// Constants
// =============================================================================

/// Public facilitator base URL
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.cronoslabs.org/v2/x402";

/// Default request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Protocol version header
const X402_VERSION_HEADER: &str = "X402-Version";

/// Settlement event reported once the transfer is final
pub const SETTLED_EVENT: &str = "payment.settled";

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the facilitator client.
#[derive(Debug, Clone, Error)]
pub enum FacilitatorError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Facilitator answered with a non-success status
    #[error("Facilitator API error: {status} - {body}")]
    ApiError { status: u16, body: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

// =============================================================================
// Response Types
// =============================================================================

/// Answer to `POST /verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorVerifyResponse {
    /// Whether the payment header is acceptable
    pub is_valid: bool,
    /// Why it is not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Anything else the facilitator reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Answer to `POST /settle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorSettleResponse {
    /// Settlement event, e.g. `payment.settled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// On-chain transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Anything else the facilitator reported (from, to, value, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FacilitatorSettleResponse {
    /// Has the transfer reached finality?
    pub fn is_settled(&self) -> bool {
        self.event.as_deref() == Some(SETTLED_EVENT)
    }

    /// Transaction hash, if present and non-empty.
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref().filter(|h| !h.is_empty())
    }
}

// =============================================================================
// Facilitator Client
// =============================================================================

/// REST client for an x402 facilitator.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Per-request deadline
    request_timeout: Duration,
}

impl FacilitatorClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify a payment header.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<FacilitatorVerifyResponse, FacilitatorError> {
        let body = self.post("/verify", request).await?;
        let response: FacilitatorVerifyResponse =
            serde_json::from_str(&body).map_err(|e| FacilitatorError::ParseError(e.to_string()))?;

        debug!(is_valid = response.is_valid, "Facilitator verify answered");
        Ok(response)
    }

    /// Submit a verified payment for settlement.
    pub async fn settle(
        &self,
        request: &VerifyRequest,
    ) -> Result<FacilitatorSettleResponse, FacilitatorError> {
        let body = self.post("/settle", request).await?;
        let response: FacilitatorSettleResponse =
            serde_json::from_str(&body).map_err(|e| FacilitatorError::ParseError(e.to_string()))?;

        debug!(
            event = response.event.as_deref().unwrap_or("none"),
            tx_hash = response.tx_hash.as_deref().unwrap_or("none"),
            "Facilitator settle answered"
        );
        Ok(response)
    }

    /// POST a JSON body and return the raw success body.
    async fn post(
        &self,
        endpoint: &str,
        request: &VerifyRequest,
    ) -> Result<String, FacilitatorError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = timeout(
            self.request_timeout,
            self.client
                .post(&url)
                .header(X402_VERSION_HEADER, request.x402_version.to_string())
                .json(request)
                .send(),
        )
        .await
        .map_err(|_| FacilitatorError::Timeout)?
        .map_err(|e| FacilitatorError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FacilitatorError::ParseError(e.to_string()))?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Facilitator returned error status");
            return Err(FacilitatorError::ApiError { status: status.as_u16(), body });
        }

        Ok(body)
    }
}

impl Default for FacilitatorClient {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}

// =============================================================================
// Tests
// =============================================================================
