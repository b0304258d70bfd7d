// SPDX-License-Identifier: MIT

//! LLM module - defines the chat model trait and implementations
//!
//! This module provides the core ChatModel trait and shared message types.
//! Model implementations are in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [gemini] - Google's Gemini API
//! - [openai] - OpenAI-compatible chat completions (OpenAI, DeepSeek, Kimi)

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod openai;

pub use factory::{create_model, Provider};

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Parts of a message - text or inline image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePart {
    /// Plain text
    Text(String),
    /// Inline image, base64-encoded
    InlineImage { mime_type: String, data: String },
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    /// Build a single-part text message
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    /// Concatenate all text parts of this message
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text(t) => Some(t.as_str()),
                MessagePart::InlineImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Core trait for chat model implementations
///
/// Implementations must support inline images in the message parts when
/// the vendor supports multimodal input; text-only degradation must be
/// explicit in the implementation, never silent data loss.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the full conversation and return the model's text completion
    async fn invoke(&self, history: &[ChatMessage]) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message() {
        let msg = ChatMessage::text(Role::User, "hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.joined_text(), "hello");
    }

    #[test]
    fn test_joined_text_skips_images() {
        let msg = ChatMessage {
            role: Role::User,
            parts: vec![
                MessagePart::Text("before ".to_string()),
                MessagePart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data: "aGk=".to_string(),
                },
                MessagePart::Text("after".to_string()),
            ],
        };
        assert_eq!(msg.joined_text(), "before after");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
