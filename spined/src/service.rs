//! Execution service: the engine's caller.
//!
//! Handles one `/execute` request end to end:
//!
//! 1. Validate the payload
//! 2. Resolve the idempotency key and take its in-flight lock
//! 3. Replay a cached result, or reject a key collision
//! 4. Verify permission (a denial ends the request)
//! 5. Run the engine and persist the result under the key

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

use spine_domain::{validate_instruction, ExecutionResult, PermissionRequest, WorkflowInstruction};
use spine_eventlog::{AuditEvent, AuditEventKind, AuditLedger};
use spine_exec::{Engine, SettlementAdapter};
use spine_store::{default_idempotency_key, IdempotencyEntry, IdempotencyStore, Lookup};

use crate::error::{DaemonError, DaemonResult};
use crate::metrics::Metrics;

// =============================================================================
// Outcomes
// =============================================================================

/// Response body for an executed or replayed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    /// The execution result
    #[serde(flatten)]
    pub result: ExecutionResult,
    /// Permission the execution ran under
    pub permission_id: String,
    /// Key the result is cached under
    pub idempotency_key: String,
}

/// Permission verification declined the request.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDenial {
    /// Permission that was checked
    pub permission_id: String,
    /// Verifier's reason
    pub reason: Option<String>,
}

impl PermissionDenial {
    /// Client-facing message.
    pub fn message(&self) -> String {
        format!("Permission denied: {}", self.reason.as_deref().unwrap_or("unknown"))
    }
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    /// The engine ran and the result was cached
    Executed(ExecuteResponse),
    /// A cached result was returned
    Replayed(ExecuteResponse),
    /// Verification declined; nothing ran and nothing was cached
    PermissionDenied(PermissionDenial),
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

// =============================================================================
// Execution Service
// =============================================================================

/// Orchestrates validation, idempotency, permission and execution.
pub struct ExecutionService {
    engine: Engine,
    settlement: Arc<dyn SettlementAdapter>,
    store: Arc<IdempotencyStore>,
    metrics: Arc<Metrics>,
    /// One async lock per idempotency key with a request in flight
    in_flight: Mutex<HashMap<String, KeyLock>>,
}

impl ExecutionService {
    /// Create a new service.
    pub fn new(
        engine: Engine,
        settlement: Arc<dyn SettlementAdapter>,
        store: Arc<IdempotencyStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine,
            settlement,
            store,
            metrics,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Metrics the service records into.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Handle one execute request.
    ///
    /// `idempotency_key` is the client-supplied key, if any. Requests
    /// sharing a key are serialized: the second waits for the first and then
    /// replays its result.
    pub async fn execute(
        &self,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> DaemonResult<ExecuteOutcome> {
        let instruction = validate_instruction(payload)?;
        let key = resolve_idempotency_key(idempotency_key, &instruction);

        // Declared before the guard so the guard is released first
        let lease = self.lease_key(&key)?;
        let _guard = lease.lock.lock().await;
        self.execute_locked(instruction, &key).await
    }

    async fn execute_locked(
        &self,
        mut instruction: WorkflowInstruction,
        key: &str,
    ) -> DaemonResult<ExecuteOutcome> {
        let workflow_id = instruction.workflow_id.clone();
        let agent_id = instruction.agent_id.clone();

        match self.store.lookup(key, &workflow_id, &agent_id).await? {
            Lookup::Miss => {}
            Lookup::Conflict(existing) => {
                warn!(
                    idempotency_key = %key,
                    %workflow_id,
                    cached_workflow_id = %existing.workflow_id,
                    "Idempotency key collision"
                );
                self.metrics.record_conflict();
                return Err(DaemonError::IdempotencyConflict { key: key.to_string() });
            }
            Lookup::Hit(entry) => {
                self.ledger()
                    .append(AuditEvent::new(
                        &workflow_id,
                        &agent_id,
                        AuditEventKind::WorkflowIdempotentHit,
                        json!({
                            "idempotencyKey": key,
                            "executionId": entry.response.execution_id,
                        }),
                    ))
                    .await?;

                info!(idempotency_key = %key, %workflow_id, "Replaying cached result");
                self.metrics.record_replay();
                return Ok(ExecuteOutcome::Replayed(ExecuteResponse {
                    result: entry.response,
                    permission_id: entry.permission_id,
                    idempotency_key: key.to_string(),
                }));
            }
        }

        let check = self
            .settlement
            .verify_permission(&PermissionRequest::for_instruction(&instruction))
            .await?;

        if !check.approved {
            self.ledger()
                .append(AuditEvent::new(
                    &workflow_id,
                    &agent_id,
                    AuditEventKind::PermissionDenied,
                    json!({ "permissionId": check.permission_id, "reason": check.reason }),
                ))
                .await?;

            warn!(%workflow_id, permission_id = %check.permission_id, "Permission denied");
            self.metrics.record_permission_denied();
            return Ok(ExecuteOutcome::PermissionDenied(PermissionDenial {
                permission_id: check.permission_id,
                reason: check.reason,
            }));
        }

        instruction.permission_id = Some(check.permission_id.clone());
        self.ledger()
            .append(AuditEvent::new(
                &workflow_id,
                &agent_id,
                AuditEventKind::PermissionVerified,
                json!({
                    "permissionId": check.permission_id,
                    "settlement": instruction.settlement,
                }),
            ))
            .await?;

        let started = Instant::now();
        let result = self.engine.run(&instruction).await?;
        self.metrics
            .record_execution(result.status, started.elapsed().as_secs_f64());

        self.store
            .set(IdempotencyEntry {
                idempotency_key: key.to_string(),
                workflow_id,
                agent_id,
                permission_id: check.permission_id.clone(),
                created_at: Utc::now(),
                response: result.clone(),
            })
            .await?;

        Ok(ExecuteOutcome::Executed(ExecuteResponse {
            result,
            permission_id: check.permission_id,
            idempotency_key: key.to_string(),
        }))
    }

    fn ledger(&self) -> &AuditLedger {
        self.engine.ledger()
    }

    fn lease_key(&self, key: &str) -> DaemonResult<KeyLease<'_>> {
        let mut locks = self
            .in_flight
            .lock()
            .map_err(|e| DaemonError::Internal(format!("In-flight lock table poisoned: {}", e)))?;
        let lock = locks.entry(key.to_string()).or_default().clone();

        Ok(KeyLease {
            in_flight: &self.in_flight,
            key: key.to_string(),
            lock,
        })
    }
}

/// Handle on one key's in-flight lock.
///
/// Dropping it, including when the request future is cancelled, removes the
/// table entry once no other request holds the key.
struct KeyLease<'a> {
    in_flight: &'a Mutex<HashMap<String, KeyLock>>,
    key: String,
    lock: KeyLock,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        match self.in_flight.lock() {
            Ok(mut locks) => {
                // One handle in the table plus ours
                if Arc::strong_count(&self.lock) <= 2 {
                    locks.remove(&self.key);
                }
            }
            Err(e) => {
                warn!(idempotency_key = %self.key, error = %e, "In-flight lock table poisoned");
            }
        }
    }
}

/// Client key when supplied and non-blank, otherwise
/// `{workflowId}:{permissionId or "none"}`.
pub fn resolve_idempotency_key(header: Option<&str>, instruction: &WorkflowInstruction) -> String {
    match header.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => default_idempotency_key(
            &instruction.workflow_id,
            instruction.permission_id.as_deref(),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use spine_domain::ExecutionStatus;
    use spine_eventlog::MemoryJournal;
    use spine_exec::{DelayActionExecutor, MockSettlement};
    use std::time::Duration;

    fn payload(workflow_id: &str, agent_id: &str) -> Value {
        json!({
            "workflowId": workflow_id,
            "agentId": agent_id,
            "steps": [{ "stepId": "s1", "type": "action", "action": "noop" }],
            "settlement": {
                "token": "USDC",
                "amount": "1.00",
                "recipient": "0xabc",
                "chainId": 338
            }
        })
    }

    fn service() -> (ExecutionService, AuditLedger) {
        service_with_delay(Duration::ZERO)
    }

    fn service_with_delay(delay: Duration) -> (ExecutionService, AuditLedger) {
        let settlement: Arc<dyn SettlementAdapter> = Arc::new(MockSettlement::new(338));
        let ledger = AuditLedger::new(Arc::new(MemoryJournal::new()));
        let actions = Arc::new(DelayActionExecutor::new(delay));
        let engine = Engine::new(actions, settlement.clone(), ledger.clone());
        let store = Arc::new(IdempotencyStore::new(Arc::new(MemoryJournal::new())));
        let metrics = Arc::new(Metrics::new().unwrap());
        (ExecutionService::new(engine, settlement, store, metrics), ledger)
    }

    fn response(outcome: ExecuteOutcome) -> ExecuteResponse {
        match outcome {
            ExecuteOutcome::Executed(r) | ExecuteOutcome::Replayed(r) => r,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_idempotency_key() {
        let mut instruction = spine_domain::validate_instruction(&payload("wf-1", "a1")).unwrap();

        assert_eq!(resolve_idempotency_key(None, &instruction), "wf-1:none");
        assert_eq!(resolve_idempotency_key(Some("  "), &instruction), "wf-1:none");
        assert_eq!(resolve_idempotency_key(Some("client-key"), &instruction), "client-key");

        instruction.permission_id = Some("perm-9".to_string());
        assert_eq!(resolve_idempotency_key(None, &instruction), "wf-1:perm-9");
    }

    #[tokio::test]
    async fn test_first_request_executes_and_caches() {
        let (service, ledger) = service();

        let outcome = service.execute(&payload("wf-1", "a1"), None).await.unwrap();

        let ExecuteOutcome::Executed(response) = outcome else {
            panic!("expected execution");
        };
        assert_eq!(response.result.status, ExecutionStatus::Completed);
        assert_eq!(response.permission_id, "mock-wf-1");
        assert_eq!(response.idempotency_key, "wf-1:none");

        let events: Vec<_> = ledger
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect();
        assert_eq!(events.first(), Some(&AuditEventKind::PermissionVerified));
        assert_eq!(events.last(), Some(&AuditEventKind::WorkflowCompleted));
    }

    #[tokio::test]
    async fn test_repeat_request_replays_identical_result() {
        let (service, ledger) = service();

        let first = response(service.execute(&payload("wf-1", "a1"), Some("k1")).await.unwrap());
        let second = service.execute(&payload("wf-1", "a1"), Some("k1")).await.unwrap();

        let ExecuteOutcome::Replayed(second) = second else {
            panic!("expected replay");
        };
        assert_eq!(first, second);

        let hits: Vec<_> = ledger
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.event == AuditEventKind::WorkflowIdempotentHit)
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].data.as_ref().unwrap()["executionId"],
            json!(first.result.execution_id)
        );
    }

    #[tokio::test]
    async fn test_key_reuse_by_other_workflow_conflicts() {
        let (service, _) = service();
        service.execute(&payload("wf-1", "a1"), Some("shared")).await.unwrap();

        let err = service.execute(&payload("wf-2", "a1"), Some("shared")).await.unwrap_err();

        assert!(matches!(err, DaemonError::IdempotencyConflict { .. }));
        assert_eq!(err.to_string(), "Idempotency-Key collision detected");
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let (service, ledger) = service();

        let err = service.execute(&json!({ "workflowId": "wf-1" }), None).await.unwrap_err();

        assert!(matches!(err, DaemonError::Validation(_)));
        assert!(ledger.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_run_once() {
        let (service, _) = service();
        let service = Arc::new(service);
        let body = payload("wf-1", "a1");

        let (a, b) = tokio::join!(
            service.execute(&body, Some("same-key")),
            service.execute(&body, Some("same-key"))
        );

        let a = a.unwrap();
        let b = b.unwrap();
        let executed = [&a, &b]
            .iter()
            .filter(|o| matches!(o, ExecuteOutcome::Executed(_)))
            .count();
        assert_eq!(executed, 1);
        assert_eq!(response(a).result.execution_id, response(b).result.execution_id);
        assert!(service.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_its_key() {
        let (service, _) = service_with_delay(Duration::from_secs(30));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            service.execute(&payload("wf-1", "a1"), Some("slow-key")),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(service.in_flight.lock().unwrap().is_empty());
    }
}
