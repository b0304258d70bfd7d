// SPDX-License-Identifier: MIT

//! Workflow state threaded through the state machine

use crate::document::{DocumentImage, DocumentTable, ParsedDocument};
use crate::llm::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// Where a checkpointed run stands. Runs only suspend at the clarify
/// point, so these are the only two phases a checkpoint can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Suspended, waiting for the user's clarification answer
    AwaitClarification,
    /// Terminal: report produced or stopped
    Done,
}

/// The single mutable record threaded through the workflow.
///
/// `messages` is an append-only log of exchanged turns; it is never
/// truncated or reordered. The document fields are copied from the
/// `ParsedDocument` at start and stay constant for the run's lifetime.
/// Exactly one of `has_clarification`, a non-empty `report_markdown`,
/// or `is_stopped` determines the next transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub messages: Vec<ChatMessage>,
    pub document_content: String,
    pub images: Vec<DocumentImage>,
    pub tables: Vec<DocumentTable>,
    pub system_prompt: String,
    pub has_clarification: bool,
    pub clarification_questions: String,
    pub report_markdown: String,
    pub is_stopped: bool,
}

impl WorkflowState {
    /// Initial state for a fresh run
    pub fn new(document: &ParsedDocument, system_prompt: String) -> Self {
        Self {
            messages: Vec::new(),
            document_content: document.markdown.clone(),
            images: document.images.clone(),
            tables: document.tables.clone(),
            system_prompt,
            has_clarification: false,
            clarification_questions: String::new(),
            report_markdown: String::new(),
            is_stopped: false,
        }
    }

    /// Append a turn to the message log. Append-only by construction;
    /// there is no API to truncate or reorder.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The most recent assistant turn, if any
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.joined_text())
    }
}
