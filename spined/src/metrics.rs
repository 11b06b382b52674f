//! Prometheus metrics for the execution service.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use spine_domain::ExecutionStatus;

/// Content type of the Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Execution counters and latency, registered on a private registry.
pub struct Metrics {
    registry: Registry,
    executions: IntCounterVec,
    replays: IntCounter,
    permission_denied: IntCounter,
    conflicts: IntCounter,
    duration: Histogram,
}

impl Metrics {
    /// Create and register all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let executions = IntCounterVec::new(
            Opts::new("spine_executions_total", "Workflow executions by final status"),
            &["status"],
        )?;
        let replays = IntCounter::new(
            "spine_idempotent_replays_total",
            "Requests answered from the idempotency store",
        )?;
        let permission_denied = IntCounter::new(
            "spine_permission_denied_total",
            "Requests rejected by permission verification",
        )?;
        let conflicts = IntCounter::new(
            "spine_idempotency_conflicts_total",
            "Idempotency keys reused by a different workflow or agent",
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "spine_execution_duration_seconds",
            "Engine run time per execution",
        ))?;

        registry.register(Box::new(executions.clone()))?;
        registry.register(Box::new(replays.clone()))?;
        registry.register(Box::new(permission_denied.clone()))?;
        registry.register(Box::new(conflicts.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            executions,
            replays,
            permission_denied,
            conflicts,
            duration,
        })
    }

    /// Record a finished engine run.
    pub fn record_execution(&self, status: ExecutionStatus, seconds: f64) {
        self.executions.with_label_values(&[status.as_str()]).inc();
        self.duration.observe(seconds);
    }

    /// Record a replayed response.
    pub fn record_replay(&self) {
        self.replays.inc();
    }

    /// Record a permission denial.
    pub fn record_permission_denied(&self) {
        self.permission_denied.inc();
    }

    /// Record an idempotency key collision.
    pub fn record_conflict(&self) {
        self.conflicts.inc();
    }

    /// Render every metric in Prometheus text format.
    pub fn export(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
