//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Audit ledger and idempotency store (durable journals)
//! - Settlement adapter (mock or facilitator)
//! - Execution engine and service
//! - API server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Open journals and load the idempotency store
//! 3. Start API server
//! 4. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use spine_eventlog::{AuditLedger, FileJournal};
use spine_exec::{create_settlement_adapter, DelayActionExecutor, Engine};
use spine_store::IdempotencyStore;

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::metrics::Metrics;
use crate::service::ExecutionService;

// =============================================================================
// Daemon
// =============================================================================

/// The spine daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Execution service shared by API handlers
    service: Arc<ExecutionService>,
}

impl Daemon {
    /// Build every component from `config`.
    ///
    /// The idempotency journal is loaded here, so a corrupt or unreadable
    /// store fails startup rather than the first request.
    pub async fn new(config: Config) -> DaemonResult<Self> {
        let audit_journal = Arc::new(FileJournal::new(&config.storage.audit_log_path));
        let idempotency_journal = Arc::new(FileJournal::new(&config.storage.idempotency_log_path));

        let ledger = AuditLedger::new(audit_journal);
        let store = Arc::new(IdempotencyStore::open(idempotency_journal).await?);
        let settlement = create_settlement_adapter(&config.settlement);
        let actions = Arc::new(DelayActionExecutor::new(config.execution.action_delay));
        let engine = Engine::new(actions, settlement.clone(), ledger);
        let metrics = Arc::new(Metrics::new()?);

        let service = Arc::new(ExecutionService::new(engine, settlement, store, metrics));

        Ok(Self { config, service })
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT). In-flight
    /// requests are allowed to finish.
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            settlement_mode = %self.config.settlement.mode,
            chain_id = self.config.settlement.chain_id,
            "Starting spine daemon"
        );

        let listener = self.bind().await?;
        let api_addr = listener.local_addr()?;
        info!(%api_addr, "API server started");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shutdown complete");
        Ok(())
    }

    /// Start the API server in the background and return its address.
    pub async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let listener = self.bind().await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    fn router(&self) -> axum::Router {
        create_router(Arc::new(ApiState {
            service: self.service.clone(),
        }))
    }

    async fn bind(&self) -> DaemonResult<TcpListener> {
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received shutdown signal");
}

// =============================================================================
// Tests
// =============================================================================
