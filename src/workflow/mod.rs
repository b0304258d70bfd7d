// SPDX-License-Identifier: MIT

//! Clarification-capable generation workflow
//!
//! A three-node state machine (analyze → clarify ⇄ analyze → generate)
//! that drives an LLM over a parsed requirement document, suspending at
//! the clarify node until the user answers.

pub mod checkpoint;
pub mod clarification;
pub mod markers;
pub mod registry;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointSaver, MemorySaver};
pub use clarification::ClarificationWorkflow;
pub use registry::WorkflowRegistry;
pub use state::{Phase, WorkflowState};
