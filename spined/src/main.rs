//! Spine Daemon
//!
//! Runs the workflow execution engine behind an HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (mock settlement, testnet)
//! cargo run -p spined
//!
//! # Start with custom environment
//! SPINE_API_PORT=8081 X402_MODE=facilitator cargo run -p spined
//! ```
//!
//! # Environment Variables
//!
//! - `SPINE_ENV`: Environment (test, development, production)
//! - `SPINE_API_HOST`: API host (default: 0.0.0.0)
//! - `SPINE_API_PORT`: API port (default: 4000)
//! - `SPINE_AUDIT_LOG_PATH`: Audit journal (default: ./data/audit.jsonl)
//! - `SPINE_IDEMPOTENCY_LOG_PATH`: Idempotency journal (default: ./data/idempotency.jsonl)
//! - `SPINE_ACTION_DELAY_MS`: Default step delay (default: 0)
//! - `X402_MODE`: Settlement adapter, mock or facilitator (default: mock)
//! - `X402_FACILITATOR_URL`: Facilitator base URL
//! - `X402_FACILITATOR_TIMEOUT_SECS`: Facilitator request timeout (default: 30)
//! - `CRONOS_CHAIN_ID`: Settlement chain (default: 338)

use spined::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("spined=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        audit_log = %config.storage.audit_log_path.display(),
        idempotency_log = %config.storage.idempotency_log_path.display(),
        "Spine execution daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new(config).await?;
    daemon.run().await?;

    Ok(())
}
