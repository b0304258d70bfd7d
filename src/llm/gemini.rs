// SPDX-License-Identifier: MIT

//! Gemini chat model - Google's generateContent API implementation

use super::{ChatMessage, ChatModel, MessagePart, Role};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: String, base_url: Option<String>, model_name: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Convert an internal message to a Gemini content entry.
    /// Gemini takes the system instruction separately, so system turns
    /// return None here.
    fn to_gemini_content(message: &ChatMessage) -> Option<serde_json::Value> {
        if message.role == Role::System {
            return None;
        }

        let role = match message.role {
            Role::Assistant => "model",
            _ => "user",
        };

        let parts: Vec<serde_json::Value> = message
            .parts
            .iter()
            .map(|p| match p {
                MessagePart::Text(t) => json!({ "text": t }),
                MessagePart::InlineImage { mime_type, data } => json!({
                    "inline_data": { "mime_type": mime_type, "data": data }
                }),
            })
            .collect();

        Some(json!({ "role": role, "parts": parts }))
    }

    /// Pull the text parts out of the first candidate
    fn parse_response(response: &serde_json::Value) -> Result<String, ModelError> {
        let candidate = response["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| {
                ModelError::InvalidResponse("No candidates in Gemini response".to_string())
            })?;

        if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            if reason == "SAFETY" {
                return Err(ModelError::InvalidResponse(
                    "Gemini blocked response due to safety filters".to_string(),
                ));
            }
        }

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelError::InvalidResponse(
                "No text parts in Gemini candidate".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn invoke(&self, history: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_name
        );

        let contents: Vec<serde_json::Value> = history
            .iter()
            .filter_map(Self::to_gemini_content)
            .collect();

        let mut body = json!({ "contents": contents });

        if let Some(system) = history
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.joined_text())
        {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("gemini", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_role_maps_to_model() {
        let msg = ChatMessage::text(Role::Assistant, "回复");
        let wire = GeminiModel::to_gemini_content(&msg).unwrap();
        assert_eq!(wire["role"], "model");
    }

    #[test]
    fn test_system_message_excluded_from_contents() {
        let msg = ChatMessage::text(Role::System, "prompt");
        assert!(GeminiModel::to_gemini_content(&msg).is_none());
    }

    #[test]
    fn test_image_becomes_inline_data() {
        let msg = ChatMessage {
            role: Role::User,
            parts: vec![MessagePart::InlineImage {
                mime_type: "image/png".to_string(),
                data: "QUJD".to_string(),
            }],
        };
        let wire = GeminiModel::to_gemini_content(&msg).unwrap();
        assert_eq!(wire["parts"][0]["inline_data"]["mime_type"], "image/png");
    }

    #[test]
    fn test_parse_response() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "生成的报告" }] }
            }]
        });
        assert_eq!(GeminiModel::parse_response(&response).unwrap(), "生成的报告");
    }

    #[test]
    fn test_parse_safety_block() {
        let response = json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        });
        assert!(GeminiModel::parse_response(&response).is_err());
    }
}
