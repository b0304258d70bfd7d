// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat completions implementation
//!
//! Also serves DeepSeek and Kimi, which expose the same wire format on
//! their own base URLs.

use super::{ChatMessage, ChatModel, MessagePart, Role};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// OpenAI-compatible chat model
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    /// Provider label for error reporting (openai, deepseek, kimi)
    provider: String,
}

impl OpenAiModel {
    pub fn new(
        provider: impl Into<String>,
        api_key: String,
        base_url: String,
        model_name: String,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
            provider: provider.into(),
        }
    }

    /// Convert an internal message to the OpenAI wire format.
    /// Multimodal parts become a content array with `image_url` entries.
    fn to_openai_message(message: &ChatMessage) -> serde_json::Value {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let has_images = message
            .parts
            .iter()
            .any(|p| matches!(p, MessagePart::InlineImage { .. }));

        if !has_images {
            return json!({
                "role": role,
                "content": message.joined_text()
            });
        }

        let content: Vec<serde_json::Value> = message
            .parts
            .iter()
            .map(|p| match p {
                MessagePart::Text(t) => json!({ "type": "text", "text": t }),
                MessagePart::InlineImage { mime_type, data } => json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", mime_type, data) }
                }),
            })
            .collect();

        json!({ "role": role, "content": content })
    }

    /// Pull the completion text out of a chat completions response
    fn parse_response(response: &serde_json::Value) -> Result<String, ModelError> {
        response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["message"]["content"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ModelError::InvalidResponse("No message content in chat completion".to_string())
            })
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn invoke(&self, history: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let messages: Vec<serde_json::Value> =
            history.iter().map(Self::to_openai_message).collect();

        let body = json!({
            "model": self.model_name,
            "messages": messages
        });

        log::debug!(
            "{} request body: {}",
            self.provider,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api(&self.provider, text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("{} response: {}", self.provider, resp_json);

        Self::parse_response(&resp_json)
    }
}
