// SPDX-License-Identifier: MIT

//! Task orchestration
//!
//! A task owns one workflow run end to end: status transitions, the
//! background job driving the model, and artifact finalization through
//! the extractor. Tasks live in an in-memory store; the workflow
//! registry ties a suspended run's thread id back to its live instance.

use crate::config::Settings;
use crate::document::ParsedDocument;
use crate::error::CasegenError;
use crate::extract::ResultExtractor;
use crate::llm::{create_model, Provider};
use crate::workflow::{ClarificationWorkflow, WorkflowRegistry, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle of a generation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Clarifying,
    Finished,
    Failed,
}

/// A generation task record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub original_filename: String,
    pub thread_id: Option<String>,
    pub status: TaskStatus,
    pub clarification_message: Option<String>,
    pub error_message: Option<String>,
    pub output_spreadsheet: Option<PathBuf>,
    pub output_summary: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// In-memory task store with monotonic id assignment
#[derive(Clone, Default)]
pub struct TaskStore {
    tasks: Arc<RwLock<HashMap<i64, Task>>>,
    next_id: Arc<AtomicI64>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub async fn create(&self, original_filename: &str) -> Task {
        let task = Task {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            original_filename: original_filename.to_string(),
            thread_id: None,
            status: TaskStatus::Running,
            clarification_message: None,
            error_message: None,
            output_spreadsheet: None,
            output_summary: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        task
    }

    pub async fn get(&self, id: i64) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(&id).cloned()
    }

    /// Newest first
    pub async fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    /// Apply a mutation to a task, returning the updated record
    pub async fn update<F>(&self, id: i64, mutate: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        mutate(task);
        Some(task.clone())
    }
}

/// Request to create a generation task
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    /// Pre-parsed requirement document
    pub document: ParsedDocument,
    pub original_filename: String,
    /// Provider name (openai, deepseek, kimi, anthropic, gemini)
    pub provider: String,
    pub model: String,
    /// Optional template prompt replacing the default system prompt
    #[serde(default)]
    pub prompt_override: Option<String>,
}

/// Orchestrates tasks: spawns workflow jobs and applies their outcomes
#[derive(Clone)]
pub struct TaskManager {
    store: TaskStore,
    registry: WorkflowRegistry,
    extractor: Arc<ResultExtractor>,
    settings: Settings,
}

impl TaskManager {
    pub fn new(settings: Settings) -> Result<Self, CasegenError> {
        let extractor = Arc::new(ResultExtractor::new(&settings.output_dir)?);
        Ok(Self {
            store: TaskStore::new(),
            registry: WorkflowRegistry::new(),
            extractor,
            settings,
        })
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn extractor(&self) -> &ResultExtractor {
        &self.extractor
    }

    /// Create a task and start its workflow in the background. Provider
    /// and credential problems surface immediately; model calls happen in
    /// the spawned job.
    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<Task, CasegenError> {
        let provider: Provider = request.provider.parse()?;
        let model = create_model(provider, request.model.clone())?;
        let base_prompt = self.settings.load_system_prompt()?;

        let task = self.store.create(&request.original_filename).await;

        let manager = self.clone();
        let task_id = task.id;
        tokio::spawn(async move {
            manager
                .run_workflow(task_id, model, base_prompt, request)
                .await;
        });

        Ok(task)
    }

    async fn run_workflow(
        &self,
        task_id: i64,
        model: Arc<dyn crate::llm::ChatModel>,
        base_prompt: String,
        request: CreateTaskRequest,
    ) {
        let workflow = Arc::new(ClarificationWorkflow::new(model, base_prompt));

        match workflow
            .start(&request.document, request.prompt_override.clone())
            .await
        {
            Ok((thread_id, state)) => {
                self.registry.put(&thread_id, workflow).await;
                self.store
                    .update(task_id, |t| t.thread_id = Some(thread_id.clone()))
                    .await;
                self.apply_workflow_state(task_id, &thread_id, state).await;
            }
            Err(err) => {
                log::error!("Task {} workflow start failed: {}", task_id, err);
                self.fail_task(task_id, err.to_string()).await;
            }
        }
    }

    /// Submit the user's clarification answer. The stop sentinel fails
    /// the task synchronously; anything else resumes the workflow in the
    /// background.
    pub async fn clarify(&self, task_id: i64, input: String) -> Result<Task, CasegenError> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| CasegenError::other("任务不存在"))?;

        if task.status != TaskStatus::Clarifying {
            return Err(CasegenError::other("任务不在澄清状态"));
        }

        if input == crate::workflow::markers::STOP_SENTINEL {
            if let Some(thread_id) = &task.thread_id {
                self.release_workflow(thread_id).await;
            }
            let updated = self.fail_task(task_id, "用户停止生成".to_string()).await;
            return updated.ok_or_else(|| CasegenError::other("任务不存在"));
        }

        let updated = self
            .store
            .update(task_id, |t| {
                t.status = TaskStatus::Running;
                t.clarification_message = None;
            })
            .await
            .ok_or_else(|| CasegenError::other("任务不存在"))?;

        let manager = self.clone();
        tokio::spawn(async move {
            manager.resume_workflow(task_id, input).await;
        });

        Ok(updated)
    }

    async fn resume_workflow(&self, task_id: i64, input: String) {
        let Some(task) = self.store.get(task_id).await else {
            return;
        };
        let Some(thread_id) = task.thread_id else {
            return;
        };

        let Some(workflow) = self.registry.get(&thread_id).await else {
            // Mid-flight state is unrecoverable; the whole task must be
            // recreated, not retried.
            log::warn!("Task {} lost workflow instance {}", task_id, thread_id);
            self.fail_task(task_id, "工作流实例丢失，请重新创建任务".to_string())
                .await;
            return;
        };

        match workflow.resume(&thread_id, &input).await {
            Ok(state) => self.apply_workflow_state(task_id, &thread_id, state).await,
            Err(err) => {
                log::error!("Task {} resume failed: {}", task_id, err);
                self.release_workflow(&thread_id).await;
                self.fail_task(task_id, err.to_string()).await;
            }
        }
    }

    /// Terminal cleanup: drop the registry entry and the instance's
    /// checkpoint for this thread
    async fn release_workflow(&self, thread_id: &str) {
        if let Some(workflow) = self.registry.remove(thread_id).await {
            workflow.discard(thread_id).await;
        }
    }

    /// Map a workflow state snapshot onto the task record. Terminal
    /// states release the registry entry exactly once.
    async fn apply_workflow_state(&self, task_id: i64, thread_id: &str, state: WorkflowState) {
        if state.is_stopped {
            self.release_workflow(thread_id).await;
            self.fail_task(task_id, "用户停止生成".to_string()).await;
        } else if state.has_clarification {
            self.store
                .update(task_id, |t| {
                    t.status = TaskStatus::Clarifying;
                    t.clarification_message = Some(state.clarification_questions.clone());
                })
                .await;
        } else if !state.report_markdown.is_empty() {
            self.release_workflow(thread_id).await;
            self.finalize_task(task_id, state.report_markdown).await;
        } else {
            self.release_workflow(thread_id).await;
            self.fail_task(task_id, "工作流未返回有效结果".to_string())
                .await;
        }
    }

    /// Run extraction off the async runtime and record the artifacts
    async fn finalize_task(&self, task_id: i64, report_markdown: String) {
        let Some(task) = self.store.get(task_id).await else {
            return;
        };

        let extractor = self.extractor.clone();
        let filename = task.original_filename.clone();
        let result = tokio::task::spawn_blocking(move || {
            extractor.extract_and_save(&report_markdown, task_id, &filename)
        })
        .await;

        match result {
            Ok(Ok(artifacts)) => {
                self.store
                    .update(task_id, |t| {
                        t.status = TaskStatus::Finished;
                        t.output_spreadsheet = Some(artifacts.spreadsheet.clone());
                        t.output_summary = Some(artifacts.summary.clone());
                        t.finished_at = Some(Utc::now());
                    })
                    .await;
            }
            Ok(Err(err)) => {
                self.fail_task(task_id, format!("结果提取失败: {}", err))
                    .await;
            }
            Err(err) => {
                self.fail_task(task_id, format!("结果提取失败: {}", err))
                    .await;
            }
        }
    }

    async fn fail_task(&self, task_id: i64, message: String) -> Option<Task> {
        self.store
            .update(task_id, |t| {
                t.status = TaskStatus::Failed;
                t.error_message = Some(message.clone());
                t.finished_at = Some(Utc::now());
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_create_assigns_increasing_ids() {
        let store = TaskStore::new();
        let a = store.create("a.md").await;
        let b = store.create("b.md").await;
        assert!(b.id > a.id);
        assert_eq!(a.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_store_update() {
        let store = TaskStore::new();
        let task = store.create("a.md").await;

        let updated = store
            .update(task.id, |t| t.status = TaskStatus::Clarifying)
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Clarifying);
        assert_eq!(store.get(task.id).await.unwrap().status, TaskStatus::Clarifying);
    }

    #[tokio::test]
    async fn test_store_update_missing_task() {
        let store = TaskStore::new();
        assert!(store.update(99, |t| t.status = TaskStatus::Failed).await.is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = TaskStore::new();
        store.create("first.md").await;
        store.create("second.md").await;

        let tasks = store.list().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].original_filename, "second.md");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Clarifying).unwrap(),
            "\"clarifying\""
        );
    }
}
