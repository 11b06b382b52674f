//! Spine Daemon Library
//!
//! Host process for the workflow execution engine.
//!
//! # Architecture
//!
//! ```text
//! HTTP → API → ExecutionService → IdempotencyStore (replay / conflict)
//!                               → SettlementAdapter (permission)
//!                               → Engine → AuditLedger
//! ```
//!
//! # Components
//!
//! - **Daemon**: Builds components and runs the API server
//! - **ExecutionService**: Idempotency, permission and execution per request
//! - **API**: HTTP endpoints (`/execute`, `/health`, `/metrics`)
//! - **Metrics**: Prometheus counters and latency histogram
//! - **Config**: Environment-based configuration
//! - **Paywall**: Middleware charging host routes through `/execute`
//!
//! # Example
//!
//! ```rust,no_run
//! use spined::{Config, Daemon};
//!
//! # async fn example() -> spined::DaemonResult<()> {
//! let config = Config::from_env()?;
//! let daemon = Daemon::new(config).await?;
//! daemon.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod metrics;
pub mod paywall;
pub mod service;

// Re-exports for convenience
pub use api::{create_router, ApiState, IDEMPOTENCY_KEY_HEADER};
pub use config::{ApiConfig, Config, Environment, ExecutionConfig, StorageConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use metrics::Metrics;
pub use paywall::{require_payment, PaidExecution, Paywall, PaywallPrice, PaywallRejection};
pub use service::{
    resolve_idempotency_key, ExecuteOutcome, ExecuteResponse, ExecutionService, PermissionDenial,
};
