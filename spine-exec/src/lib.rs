//! Spine Execution Layer
//!
//! Ordered, retried, audited workflow execution bound to a single payment
//! settlement.
//!
//! # Architecture
//!
//! ```text
//! Instruction → Engine → ActionExecutor (per attempt) → AuditLedger
//!                      → SettlementAdapter (once, all steps completed)
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for step actions and settlement
//! - **Engine**: Step ordering, retry budgets, settlement gating, audit
//! - **Adapters**: Mock and facilitator-backed settlement
//! - **Stub**: Reference action executor and mock settlement
//!
//! # Example
//!
//! ```rust,no_run
//! use spine_eventlog::{AuditLedger, MemoryJournal};
//! use spine_exec::{DelayActionExecutor, Engine, MockSettlement};
//! use std::sync::Arc;
//!
//! # use spine_domain::WorkflowInstruction;
//! # async fn example(instruction: WorkflowInstruction) -> spine_exec::ExecResult<()> {
//! let engine = Engine::new(
//!     Arc::new(DelayActionExecutor::default()),
//!     Arc::new(MockSettlement::new(338)),
//!     AuditLedger::new(Arc::new(MemoryJournal::new())),
//! );
//!
//! let result = engine.run(&instruction).await?;
//! println!("{} -> {:?}", result.execution_id, result.status);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod facilitator;
pub mod ports;
pub mod proof;
pub mod settlement;
pub mod stub;

// Re-exports for convenience
pub use engine::Engine;
pub use error::{ActionError, ExecError, ExecResult};
pub use facilitator::FacilitatorSettlement;
pub use ports::{ActionExecutor, SettlementAdapter};
pub use proof::{build_verify_request, maybe_build_verify_request, placeholder_verify_request};
pub use settlement::{create_settlement_adapter, SettlementConfig, SettlementMode};
pub use stub::{mock_tx_hash, DelayActionExecutor, MockSettlement};
