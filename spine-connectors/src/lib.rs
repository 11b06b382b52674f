//! Spine External Connectors
//!
//! Adapters for the external services the engine talks to.
//! Normalizes service-specific payloads to domain types.

#![warn(clippy::all)]

// Public modules
pub mod facilitator;

// Re-exports
pub use facilitator::{
    FacilitatorClient, FacilitatorError, FacilitatorSettleResponse, FacilitatorVerifyResponse,
    DEFAULT_FACILITATOR_URL, SETTLED_EVENT,
};
