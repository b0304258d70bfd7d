// SPDX-License-Identifier: MIT

//! Clarification workflow - analyze → (clarify ⇄ analyze) → generate
//!
//! An explicit finite-state machine over `WorkflowState`. Routing is done
//! by pure functions of the state; model calls happen only in the analyze
//! and generate nodes. Model errors propagate to the caller untouched so
//! the enclosing task can be marked failed; there is no retry here.

use super::checkpoint::{Checkpoint, CheckpointSaver, MemorySaver};
use super::markers::{self, UserReply};
use super::state::{Phase, WorkflowState};
use crate::document::ParsedDocument;
use crate::error::WorkflowError;
use crate::llm::{ChatMessage, ChatModel, MessagePart, Role};
use std::sync::Arc;
use uuid::Uuid;

/// Instruction suffix for the analysis node
const ANALYSIS_INSTRUCTION: &str = "请严格按照系统提示中的工作流程，完整执行所有步骤，生成完整的测试用例报告。

如果在分析过程中发现需要澄清的问题，请在报告中明确标注\"无法继续生成测试用例，存在以下问题需要澄清\"，并列出待澄清问题。";

/// Instruction suffix for the post-clarification generation node
const GENERATE_INSTRUCTION: &str = "基于用户提供的澄清信息继续完成后续步骤，生成完整的测试用例报告。";

/// Route taken after the analysis node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisRoute {
    Clarify,
    End,
}

/// Route taken after a literal clarification answer is appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClarifyRoute {
    Analyze,
    Generate,
}

/// The clarification-capable generation workflow.
///
/// One instance drives one or more runs; each run is identified by an
/// opaque thread id and checkpointed at every suspension, so `resume` can
/// pick up where `start` left off.
pub struct ClarificationWorkflow {
    model: Arc<dyn ChatModel>,
    base_prompt: String,
    checkpoints: Arc<dyn CheckpointSaver>,
}

impl ClarificationWorkflow {
    pub fn new(model: Arc<dyn ChatModel>, base_prompt: String) -> Self {
        Self {
            model,
            base_prompt,
            checkpoints: Arc::new(MemorySaver::new()),
        }
    }

    /// Use a custom checkpoint backend instead of the in-memory saver
    pub fn with_checkpoint_saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpoints = saver;
        self
    }

    /// Start a new run: analyze the document once, then either suspend
    /// for clarification or finish with the report. Returns the fresh
    /// thread id and the resulting state snapshot.
    pub async fn start(
        &self,
        document: &ParsedDocument,
        prompt_override: Option<String>,
    ) -> Result<(String, WorkflowState), WorkflowError> {
        let thread_id = Uuid::new_v4().to_string();
        let system_prompt = prompt_override.unwrap_or_else(|| self.base_prompt.clone());

        let mut state = WorkflowState::new(document, system_prompt);
        self.analyze(&mut state).await?;

        let phase = match route_after_analysis(&state) {
            AnalysisRoute::Clarify => Phase::AwaitClarification,
            AnalysisRoute::End => Phase::Done,
        };

        log::info!(
            "Workflow {} started, phase {:?}, clarification={}",
            thread_id,
            phase,
            state.has_clarification
        );

        self.checkpoints
            .put(
                &thread_id,
                Checkpoint {
                    phase,
                    state: state.clone(),
                },
            )
            .await;

        Ok((thread_id, state))
    }

    /// Resume a suspended run with the user's reply.
    ///
    /// The checkpoint is taken out of the saver for the duration of the
    /// step and written back at the end, so a racing second resume on the
    /// same thread observes "instance lost" instead of corrupted state.
    pub async fn resume(
        &self,
        thread_id: &str,
        user_text: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut checkpoint = self
            .checkpoints
            .take(thread_id)
            .await
            .ok_or_else(|| WorkflowError::InstanceLost(thread_id.to_string()))?;

        if checkpoint.phase != Phase::AwaitClarification {
            let phase = checkpoint.phase;
            self.checkpoints.put(thread_id, checkpoint).await;
            log::warn!("Resume on thread {} in phase {:?}", thread_id, phase);
            return Err(WorkflowError::NotAwaitingClarification(
                thread_id.to_string(),
            ));
        }

        let state = &mut checkpoint.state;

        let result = match markers::classify_user_reply(user_text) {
            UserReply::Stop => {
                state.is_stopped = true;
                Ok(())
            }
            // Skip is unconditional: the pending questions are dropped and
            // generation runs regardless of what the assistant turn still
            // says, so the run cannot re-suspend after the user asked to
            // finish.
            UserReply::Skip => {
                state.has_clarification = false;
                state.clarification_questions.clear();
                state.push_message(ChatMessage::text(Role::User, markers::SKIP_MESSAGE));
                self.generate(state).await
            }
            UserReply::Clarification(text) => {
                state.push_message(ChatMessage::text(
                    Role::User,
                    format!("用户澄清信息：\n{}", text),
                ));
                match route_after_clarification(state) {
                    ClarifyRoute::Analyze => self.analyze(state).await,
                    ClarifyRoute::Generate => self.generate(state).await,
                }
            }
        };

        if let Err(err) = result {
            // Model failure is terminal for the run; drop the checkpoint
            // so a retry cannot resume into a half-applied step.
            log::error!("Workflow {} step failed: {}", thread_id, err);
            return Err(err);
        }

        checkpoint.phase = if state.is_stopped {
            Phase::Done
        } else if state.has_clarification {
            Phase::AwaitClarification
        } else {
            Phase::Done
        };

        log::info!("Workflow {} resumed into {:?}", thread_id, checkpoint.phase);

        let snapshot = checkpoint.state.clone();
        self.checkpoints.put(thread_id, checkpoint).await;
        Ok(snapshot)
    }

    /// Checkpointed state for a thread, if it exists in this process
    pub async fn get_state(&self, thread_id: &str) -> Option<Checkpoint> {
        self.checkpoints.get(thread_id).await
    }

    /// Drop a thread's checkpoint (terminal cleanup)
    pub async fn discard(&self, thread_id: &str) {
        self.checkpoints.take(thread_id).await;
    }

    /// Analysis node: full document + accumulated history, marker scan on
    /// the response. On the first run the history is empty.
    async fn analyze(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let mut history = vec![ChatMessage::text(Role::System, state.system_prompt.clone())];
        history.extend(state.messages.iter().cloned());
        history.push(multimodal_turn(state, ANALYSIS_INSTRUCTION));

        let response_text = self.model.invoke(&history).await?;

        match markers::find_clarification(&response_text) {
            Some(questions) => {
                state.has_clarification = true;
                state.clarification_questions = questions;
            }
            None => {
                state.has_clarification = false;
                state.clarification_questions.clear();
            }
        }

        state.report_markdown = response_text.clone();
        state.push_message(ChatMessage::text(Role::Assistant, response_text));
        Ok(())
    }

    /// Generation node: full accumulated history plus the document
    /// restated, producing the final report.
    async fn generate(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let mut history = vec![ChatMessage::text(Role::System, state.system_prompt.clone())];
        history.extend(state.messages.iter().cloned());
        history.push(multimodal_turn(state, GENERATE_INSTRUCTION));

        let response_text = self.model.invoke(&history).await?;

        state.report_markdown = response_text.clone();
        state.has_clarification = false;
        state.clarification_questions.clear();
        state.push_message(ChatMessage::text(Role::Assistant, response_text));
        Ok(())
    }
}

/// Build the multimodal human turn: document text, tables, image captions
/// with inline data, then the node's instruction suffix. The order is
/// fixed so resumed runs reproduce it identically.
fn multimodal_turn(state: &WorkflowState, instruction: &str) -> ChatMessage {
    let mut parts = Vec::new();

    let mut doc_text = format!("## 需求文档内容\n\n{}", state.document_content);

    if !state.tables.is_empty() {
        doc_text.push_str("\n\n## 文档中的表格\n");
        for table in &state.tables {
            doc_text.push_str(&format!("\n### {}\n{}\n", table.caption, table.markdown));
        }
    }

    parts.push(MessagePart::Text(doc_text));

    if !state.images.is_empty() {
        parts.push(MessagePart::Text("\n\n## 文档中的图片\n".to_string()));
        for image in &state.images {
            parts.push(MessagePart::Text(format!("\n### {}\n", image.caption)));
            parts.push(MessagePart::InlineImage {
                mime_type: "image/png".to_string(),
                data: image.base64.clone(),
            });
        }
    }

    parts.push(MessagePart::Text(format!("\n\n{}", instruction)));

    ChatMessage {
        role: Role::User,
        parts,
    }
}

/// After analysis: suspend when the model asked for clarification,
/// otherwise the response already is the final report.
fn route_after_analysis(state: &WorkflowState) -> AnalysisRoute {
    if state.is_stopped {
        return AnalysisRoute::End;
    }
    if state.has_clarification {
        return AnalysisRoute::Clarify;
    }
    AnalysisRoute::End
}

/// After a literal clarification answer: re-analyze while the previous
/// assistant turn still carries open-question indicators, otherwise
/// generate.
fn route_after_clarification(state: &WorkflowState) -> ClarifyRoute {
    match state.last_assistant_text() {
        Some(text) if markers::wants_reanalysis(&text) => ClarifyRoute::Analyze,
        _ => ClarifyRoute::Generate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock model that returns scripted responses in order and records
    /// the history it was invoked with
    struct MockModel {
        responses: Vec<String>,
        call_index: AtomicUsize,
        histories: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockModel {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: responses.into_iter().map(String::from).collect(),
                call_index: AtomicUsize::new(0),
                histories: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn invoke(&self, history: &[ChatMessage]) -> Result<String, ModelError> {
            self.histories.lock().unwrap().push(history.to_vec());
            let idx = self.call_index.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(idx)
                .cloned()
                .ok_or_else(|| ModelError::InvalidResponse("no scripted response".to_string()))
        }
    }

    /// Mock model that always fails
    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn invoke(&self, _history: &[ChatMessage]) -> Result<String, ModelError> {
            Err(ModelError::api("mock", "connection reset"))
        }
    }

    fn make_workflow(responses: Vec<&str>) -> (ClarificationWorkflow, Arc<MockModel>) {
        let model = Arc::new(MockModel::new(responses));
        let workflow = ClarificationWorkflow::new(model.clone(), "系统提示".to_string());
        (workflow, model)
    }

    const REPORT: &str = "# 测试用例报告\n\n| 用例编号 | 用例名称 |\n| --- | --- |\n| TC-001 | 登录 |\n\n## 测试覆盖度总结\n已覆盖全部需求";

    const CLARIFY_RESPONSE: &str =
        "初步分析...\n无法继续生成测试用例，存在以下问题需要澄清\n🔴 待澄清问题：数据来源是什么？";

    #[tokio::test]
    async fn test_start_without_clarification_is_terminal() {
        let (workflow, _) = make_workflow(vec![REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, state) = workflow.start(&doc, None).await.unwrap();

        assert!(!state.has_clarification);
        assert!(!state.is_stopped);
        assert_eq!(state.report_markdown, REPORT);

        let checkpoint = workflow.get_state(&thread_id).await.unwrap();
        assert_eq!(checkpoint.phase, Phase::Done);
    }

    #[tokio::test]
    async fn test_start_with_clarification_suspends() {
        let (workflow, _) = make_workflow(vec![CLARIFY_RESPONSE]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, state) = workflow.start(&doc, None).await.unwrap();

        assert!(state.has_clarification);
        assert_eq!(
            state.clarification_questions,
            "无法继续生成测试用例，存在以下问题需要澄清\n🔴 待澄清问题：数据来源是什么？"
        );

        let checkpoint = workflow.get_state(&thread_id).await.unwrap();
        assert_eq!(checkpoint.phase, Phase::AwaitClarification);
    }

    #[tokio::test]
    async fn test_clarification_answer_reanalyzes_then_finishes() {
        // Analysis asks twice, then the re-analysis produces the report
        let (workflow, model) = make_workflow(vec![CLARIFY_RESPONSE, REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, _) = workflow.start(&doc, None).await.unwrap();
        let state = workflow.resume(&thread_id, "数据来源是CSV文件").await.unwrap();

        assert!(!state.has_clarification);
        assert_eq!(state.report_markdown, REPORT);
        // messages: assistant(clarify), user(answer), assistant(report)
        assert_eq!(state.messages.len(), 3);

        // The re-analysis call must include the accumulated history
        let histories = model.histories.lock().unwrap();
        assert_eq!(histories.len(), 2);
        let second_call = &histories[1];
        assert!(second_call
            .iter()
            .any(|m| m.joined_text().contains("用户澄清信息")));
    }

    #[tokio::test]
    async fn test_resume_routes_to_generate_without_indicators() {
        // Assistant turn carries the marker but none of the re-analysis
        // indicators, so the answer routes straight to generation
        let bare_clarify = "无法继续生成测试用例，存在以下问题需要澄清\n请说明数据来源";
        let (workflow, _) = make_workflow(vec![bare_clarify, REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, start_state) = workflow.start(&doc, None).await.unwrap();
        assert!(start_state.has_clarification);

        let state = workflow.resume(&thread_id, "CSV 文件").await.unwrap();
        assert_eq!(state.report_markdown, REPORT);
        assert!(!state.has_clarification);
    }

    #[tokio::test]
    async fn test_resume_stop_sentinel() {
        let (workflow, _) = make_workflow(vec![CLARIFY_RESPONSE]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, _) = workflow.start(&doc, None).await.unwrap();
        let state = workflow.resume(&thread_id, markers::STOP_SENTINEL).await.unwrap();

        assert!(state.is_stopped);
        let checkpoint = workflow.get_state(&thread_id).await.unwrap();
        assert_eq!(checkpoint.phase, Phase::Done);
    }

    #[tokio::test]
    async fn test_resume_skip_sentinel_generates() {
        let (workflow, model) = make_workflow(vec![CLARIFY_RESPONSE, REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, _) = workflow.start(&doc, None).await.unwrap();
        let state = workflow.resume(&thread_id, markers::SKIP_SENTINEL).await.unwrap();

        assert!(!state.has_clarification);
        assert_eq!(state.report_markdown, REPORT);

        // The synthetic skip turn must be in the generate call's history
        let histories = model.histories.lock().unwrap();
        let generate_call = &histories[1];
        assert!(generate_call
            .iter()
            .any(|m| m.joined_text().contains(markers::SKIP_MESSAGE)));
    }

    #[tokio::test]
    async fn test_skip_never_reanalyzes_despite_pending_indicators() {
        // The pending assistant turn carries 待澄清问题/🔴 and the next
        // response carries the marker again; skip must still run the
        // generate node and end the run terminal.
        let marker_report = format!(
            "{}\n无法继续生成测试用例，存在以下问题需要澄清\n新的问题",
            REPORT
        );
        let (workflow, model) = make_workflow(vec![CLARIFY_RESPONSE, marker_report.as_str()]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, start_state) = workflow.start(&doc, None).await.unwrap();
        assert!(markers::wants_reanalysis(&start_state.last_assistant_text().unwrap()));

        let state = workflow.resume(&thread_id, markers::SKIP_SENTINEL).await.unwrap();

        assert!(!state.has_clarification);
        assert!(state.clarification_questions.is_empty());
        assert_eq!(state.report_markdown, marker_report);

        let checkpoint = workflow.get_state(&thread_id).await.unwrap();
        assert_eq!(checkpoint.phase, Phase::Done);

        // The second call must be the generate node, not a re-analysis
        let histories = model.histories.lock().unwrap();
        let last_turn = histories[1].last().unwrap().joined_text();
        assert!(last_turn.contains(GENERATE_INSTRUCTION));
        assert!(!last_turn.contains(ANALYSIS_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_discard_drops_checkpoint() {
        let (workflow, _) = make_workflow(vec![CLARIFY_RESPONSE]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, _) = workflow.start(&doc, None).await.unwrap();
        assert!(workflow.get_state(&thread_id).await.is_some());

        workflow.discard(&thread_id).await;
        assert!(workflow.get_state(&thread_id).await.is_none());

        let err = workflow.resume(&thread_id, "回答").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InstanceLost(_)));
    }

    #[tokio::test]
    async fn test_resume_unknown_thread_is_instance_lost() {
        let (workflow, _) = make_workflow(vec![]);
        let err = workflow.resume("no-such-thread", "回答").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InstanceLost(_)));
    }

    #[tokio::test]
    async fn test_resume_terminal_thread_rejected() {
        let (workflow, _) = make_workflow(vec![REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        let (thread_id, _) = workflow.start(&doc, None).await.unwrap();
        let err = workflow.resume(&thread_id, "回答").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotAwaitingClarification(_)));
    }

    #[tokio::test]
    async fn test_model_error_propagates_from_start() {
        let workflow =
            ClarificationWorkflow::new(Arc::new(FailingModel), "系统提示".to_string());
        let doc = ParsedDocument::from_markdown("需求内容");

        let err = workflow.start(&doc, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Model(_)));
    }

    #[tokio::test]
    async fn test_prompt_override_replaces_base_prompt() {
        let (workflow, model) = make_workflow(vec![REPORT]);
        let doc = ParsedDocument::from_markdown("需求内容");

        workflow
            .start(&doc, Some("模板提示".to_string()))
            .await
            .unwrap();

        let histories = model.histories.lock().unwrap();
        let system = &histories[0][0];
        assert_eq!(system.role, Role::System);
        assert_eq!(system.joined_text(), "模板提示");
    }

    #[test]
    fn test_multimodal_turn_order() {
        let doc = ParsedDocument {
            markdown: "正文".to_string(),
            images: vec![crate::document::DocumentImage {
                caption: "架构图".to_string(),
                base64: "QUJD".to_string(),
            }],
            tables: vec![crate::document::DocumentTable {
                caption: "字段表".to_string(),
                markdown: "| A |\n| - |\n| 1 |".to_string(),
            }],
        };
        let state = WorkflowState::new(&doc, "p".to_string());
        let turn = multimodal_turn(&state, "指令");

        // text(doc+tables), text(image header), text(caption), image, text(instruction)
        assert_eq!(turn.parts.len(), 5);
        let text = turn.joined_text();
        assert!(text.contains("## 需求文档内容"));
        assert!(text.contains("## 文档中的表格"));
        assert!(text.contains("字段表"));
        assert!(text.contains("## 文档中的图片"));
        assert!(text.contains("架构图"));
        assert!(text.ends_with("\n\n指令"));
        let table_pos = text.find("## 文档中的表格").unwrap();
        let image_pos = text.find("## 文档中的图片").unwrap();
        assert!(table_pos < image_pos);
    }

    #[test]
    fn test_route_after_analysis() {
        let doc = ParsedDocument::from_markdown("doc");
        let mut state = WorkflowState::new(&doc, "p".to_string());

        state.report_markdown = "report".to_string();
        assert_eq!(route_after_analysis(&state), AnalysisRoute::End);

        state.has_clarification = true;
        assert_eq!(route_after_analysis(&state), AnalysisRoute::Clarify);

        state.is_stopped = true;
        assert_eq!(route_after_analysis(&state), AnalysisRoute::End);
    }
}
