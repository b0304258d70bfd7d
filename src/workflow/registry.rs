// SPDX-License-Identifier: MIT

//! Process-wide registry of live workflow instances
//!
//! Maps a thread id to the workflow holding its in-memory checkpoint so a
//! suspended run can be resumed by the same process. Entries must be
//! removed once a thread reaches a terminal state; there is no eviction
//! beyond that, which bounds this design to a single process.

use super::clarification::ClarificationWorkflow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Arc<RwLock<HashMap<String, Arc<ClarificationWorkflow>>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, thread_id: &str, workflow: Arc<ClarificationWorkflow>) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(thread_id.to_string(), workflow);
    }

    /// `None` means the instance is lost: either the thread never existed
    /// here or the process restarted. The caller decides which message to
    /// surface based on its own records.
    pub async fn get(&self, thread_id: &str) -> Option<Arc<ClarificationWorkflow>> {
        let workflows = self.workflows.read().await;
        workflows.get(thread_id).cloned()
    }

    pub async fn remove(&self, thread_id: &str) -> Option<Arc<ClarificationWorkflow>> {
        let mut workflows = self.workflows.write().await;
        workflows.remove(thread_id)
    }
}
