// SPDX-License-Identifier: MIT

//! casegen-rs - LLM-driven test case generation with human-in-the-loop
//! clarification.
//!
//! A requirement document is analyzed by an LLM; when the model cannot
//! proceed it suspends and asks the user for clarification. The final
//! markdown report is post-processed into a spreadsheet of test cases
//! plus a narrative summary.

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod llm;
pub mod server;
pub mod task;
pub mod workflow;
