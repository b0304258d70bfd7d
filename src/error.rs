// SPDX-License-Identifier: MIT

//! Typed error handling for casegen-rs
//!
//! Errors are layered: each subsystem has its own enum, with a top-level
//! `CasegenError` that the binary and HTTP handlers report from.

use thiserror::Error;

/// Top-level error type for casegen-rs
#[derive(Debug, Error)]
pub enum CasegenError {
    /// Model/LLM errors
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Workflow-specific errors
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Result extraction errors
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// API errors from the vendor endpoint
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Unknown provider name
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Response did not contain usable text
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The thread's checkpoint is gone: never started here, finished, or
    /// lost to a restart. Unrecoverable; the whole task must be restarted.
    /// The task layer distinguishes "task does not exist" from its own
    /// records before this ever surfaces.
    #[error("工作流实例丢失，请重新创建任务 (thread {0})")]
    InstanceLost(String),

    /// Resume called on a thread that is not suspended at the clarify state
    #[error("Workflow thread {0} is not awaiting clarification")]
    NotAwaitingClarification(String),

    /// Model call failed during a workflow node; propagated, never retried
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No markdown table anywhere in the report; fatal for the artifact
    #[error("报告中未找到测试用例表格")]
    NoTableFound,

    /// Table matched the grammar but could not be parsed
    #[error("表格格式不正确: {0}")]
    MalformedTable(String),

    /// Spreadsheet serialization failed
    #[error("Failed to write spreadsheet: {0}")]
    Spreadsheet(String),

    /// I/O errors while writing artifacts
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CasegenError {
    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<&str> for CasegenError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for CasegenError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExtractError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}
