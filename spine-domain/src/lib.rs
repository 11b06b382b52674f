//! Spine Domain Layer
//!
//! Pure domain types with zero I/O dependencies: workflow instructions,
//! execution results, settlement shapes and the instruction validator.
//!
//! All types serialize with the camelCase field names used on the wire and
//! in the durable logs.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod chain;
pub mod execution;
pub mod settlement;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use chain::{explorer_url, CronosNetwork};
pub use execution::{ExecutionResult, ExecutionStatus, StepResult, StepStatus};
pub use settlement::{
    PaymentRequirements, PermissionCheck, PermissionRequest, SettlementContext, SettlementNetwork,
    SettlementProof, SettlementResult, SettlementStatus, Verification, VerifyRequest,
    DEFAULT_X402_VERSION,
};
pub use validation::{validate_instruction, validate_instruction_at, ValidationError};
pub use workflow::{Parameters, SettlementPlan, StepKind, Token, WorkflowInstruction, WorkflowStep};
