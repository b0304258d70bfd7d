// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Settings come from environment variables with sensible defaults, the
//! same way model credentials do. `.env` loading happens in the binary.

use std::env;
use std::path::PathBuf;

/// Default system prompt shipped with the binary. Can be overridden per
/// run with `CASEGEN_PROMPT_FILE` or per task with a template prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../config/prompt.md");

/// Process-wide settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory where artifacts (xlsx, summary, full output) are written
    pub output_dir: PathBuf,
    /// Optional path to a system prompt file replacing the built-in one
    pub prompt_file: Option<PathBuf>,
}

impl Settings {
    /// Build settings from the environment
    pub fn from_env() -> Self {
        let output_dir = env::var("CASEGEN_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("output"));
        let prompt_file = env::var("CASEGEN_PROMPT_FILE").ok().map(PathBuf::from);

        Self {
            output_dir,
            prompt_file,
        }
    }

    /// Load the system prompt: the configured file if present, otherwise
    /// the built-in default.
    pub fn load_system_prompt(&self) -> std::io::Result<String> {
        match &self.prompt_file {
            Some(path) => std::fs::read_to_string(path),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
