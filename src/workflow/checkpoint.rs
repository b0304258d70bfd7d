// SPDX-License-Identifier: MIT

//! Checkpoint storage for suspended workflows
//!
//! A checkpoint is a serializable snapshot of the workflow state plus the
//! phase it suspended in, keyed by thread id. The trait is the seam for a
//! durable backend; the in-memory saver loses checkpoints on restart, so
//! in-flight clarifications then surface as "instance lost".

use super::state::{Phase, WorkflowState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Snapshot of a workflow run as of its last suspension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: Phase,
    pub state: WorkflowState,
}

/// Storage for checkpoints keyed by thread id
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint);
    async fn get(&self, thread_id: &str) -> Option<Checkpoint>;
    /// Remove and return the checkpoint, leaving the thread id unknown
    async fn take(&self, thread_id: &str) -> Option<Checkpoint>;
}

/// In-memory checkpoint saver
#[derive(Default)]
pub struct MemorySaver {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointSaver for MemorySaver {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(thread_id.to_string(), checkpoint);
    }

    async fn get(&self, thread_id: &str) -> Option<Checkpoint> {
        let checkpoints = self.checkpoints.read().await;
        checkpoints.get(thread_id).cloned()
    }

    async fn take(&self, thread_id: &str) -> Option<Checkpoint> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(thread_id)
    }
}
