// SPDX-License-Identifier: MIT

//! Anthropic chat model - Claude messages API implementation

use super::{ChatMessage, ChatModel, MessagePart, Role};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    pub fn new(api_key: String, base_url: String, model_name: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        }
    }

    /// System turns are lifted out of the message list for Anthropic
    fn extract_system_prompt(history: &[ChatMessage]) -> Option<String> {
        history
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.joined_text())
    }

    /// Convert an internal message to an Anthropic message block
    fn to_anthropic_message(message: &ChatMessage) -> Option<serde_json::Value> {
        // System messages are handled separately
        if message.role == Role::System {
            return None;
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };

        let content: Vec<serde_json::Value> = message
            .parts
            .iter()
            .map(|p| match p {
                MessagePart::Text(t) => json!({ "type": "text", "text": t }),
                MessagePart::InlineImage { mime_type, data } => json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": mime_type,
                        "data": data
                    }
                }),
            })
            .collect();

        if content.is_empty() {
            return None;
        }

        Some(json!({ "role": role, "content": content }))
    }

    /// Concatenate the text blocks of an Anthropic response
    fn parse_response(response: &serde_json::Value) -> Result<String, ModelError> {
        let blocks = response["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("No content in Anthropic response".to_string())
        })?;

        let text: String = blocks
            .iter()
            .filter_map(|b| {
                if b["type"] == "text" {
                    b["text"].as_str()
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ModelError::InvalidResponse(
                "Anthropic response contained no text blocks".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    async fn invoke(&self, history: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));

        let messages: Vec<serde_json::Value> = history
            .iter()
            .filter_map(Self::to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": messages
        });

        if let Some(system) = Self::extract_system_prompt(history) {
            body["system"] = json!(system);
        }

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("anthropic", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
