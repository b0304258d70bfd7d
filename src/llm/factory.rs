// SPDX-License-Identifier: MIT

//! Model factory - builds the right ChatModel for a provider name
//!
//! Credentials come from `<PROVIDER>_API_KEY` environment variables, with
//! optional `<PROVIDER>_BASE_URL` overrides for proxied endpoints.
//! DeepSeek and Kimi speak the OpenAI wire format on their own hosts.

use super::anthropic::AnthropicModel;
use super::gemini::GeminiModel;
use super::openai::OpenAiModel;
use super::ChatModel;
use crate::error::ModelError;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    DeepSeek,
    Kimi,
    Anthropic,
    Gemini,
}

impl Provider {
    /// Canonical lowercase name, used in env var lookups and errors
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
            Provider::Kimi => "kimi",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI",
            Provider::DeepSeek => "DEEPSEEK",
            Provider::Kimi => "KIMI",
            Provider::Anthropic => "ANTHROPIC",
            Provider::Gemini => "GEMINI",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Kimi => "https://api.moonshot.cn/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl FromStr for Provider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            "kimi" | "moonshot" => Ok(Provider::Kimi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(ModelError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Build a model from explicit credentials
pub fn create_model_with_credentials(
    provider: Provider,
    api_key: String,
    base_url: Option<String>,
    model_name: String,
) -> Arc<dyn ChatModel> {
    let base_url = base_url.unwrap_or_else(|| provider.default_base_url().to_string());

    match provider {
        Provider::OpenAi | Provider::DeepSeek | Provider::Kimi => Arc::new(OpenAiModel::new(
            provider.name(),
            api_key,
            base_url,
            model_name,
        )),
        Provider::Anthropic => Arc::new(AnthropicModel::new(api_key, base_url, model_name)),
        Provider::Gemini => Arc::new(GeminiModel::new(api_key, Some(base_url), model_name)),
    }
}

/// Build a model reading credentials from the environment
pub fn create_model(provider: Provider, model_name: String) -> Result<Arc<dyn ChatModel>, ModelError> {
    let prefix = provider.env_prefix();
    let api_key = env::var(format!("{}_API_KEY", prefix))
        .map_err(|_| ModelError::ApiKeyMissing(provider.name().to_string()))?;
    let base_url = env::var(format!("{}_BASE_URL", prefix)).ok();

    Ok(create_model_with_credentials(
        provider, api_key, base_url, model_name,
    ))
}
