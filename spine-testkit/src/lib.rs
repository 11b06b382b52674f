//! Test helpers for spine tests.
//!
//! Provides sample instructions, scripted action executors and scratch
//! data directories.

mod fixtures;
mod scripted;

pub use fixtures::{sample_instruction, sample_payload, ScratchDir};
pub use scripted::ScriptedExecutor;

/// Result alias for test helpers.
pub type Result<T> = anyhow::Result<T>;
