// SPDX-License-Identifier: MIT

//! Marker strings exchanged with the model and the user
//!
//! Control flow hangs off fixed natural-language substrings in LLM output
//! and user input. The phrases must match the prompt byte-for-byte; all
//! matching lives here so the strategy can be swapped in one place.

/// Phrase the model emits when it cannot proceed without more information
pub const CLARIFICATION_MARKER: &str = "无法继续生成测试用例，存在以下问题需要澄清";

/// User input that aborts the run
pub const STOP_SENTINEL: &str = "停止生成";

/// User input that skips the pending questions and continues
pub const SKIP_SENTINEL: &str = "忽略待澄清内容，继续生成";

/// Substrings in an assistant turn that mean its questions are still open,
/// so a clarification answer should trigger re-analysis
const REANALYSIS_INDICATORS: [&str; 2] = ["待澄清问题", "🔴"];

/// Synthetic human turn recorded when the user skips clarification
pub const SKIP_MESSAGE: &str = "用户选择忽略澄清问题，继续生成测试用例";

/// How a user reply at the clarify suspend point routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReply {
    /// Abort the run
    Stop,
    /// Drop the pending questions and generate anyway
    Skip,
    /// Literal clarification text to feed back to the model
    Clarification(String),
}

/// Classify a user reply against the literal sentinels
pub fn classify_user_reply(text: &str) -> UserReply {
    if text == STOP_SENTINEL {
        UserReply::Stop
    } else if text == SKIP_SENTINEL {
        UserReply::Skip
    } else {
        UserReply::Clarification(text.to_string())
    }
}

/// If the model's response contains the clarification marker, return
/// everything from the marker to the end of text, trimmed.
pub fn find_clarification(response_text: &str) -> Option<String> {
    response_text
        .find(CLARIFICATION_MARKER)
        .map(|pos| response_text[pos..].trim().to_string())
}

/// Does this assistant turn still carry open clarification questions?
pub fn wants_reanalysis(assistant_text: &str) -> bool {
    REANALYSIS_INDICATORS
        .iter()
        .any(|marker| assistant_text.contains(marker))
}
