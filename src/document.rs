// SPDX-License-Identifier: MIT

//! Parsed requirement document contract
//!
//! Documents are parsed into markdown plus captioned images and tables by
//! an external converter; this module only defines the shape the workflow
//! consumes. Plain markdown/text files can be wrapped directly.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// An image extracted from the document, base64-encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentImage {
    pub caption: String,
    /// Base64-encoded PNG data
    pub base64: String,
}

/// A table extracted from the document, rendered as markdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTable {
    pub caption: String,
    pub markdown: String,
}

/// A requirement document after parsing. Immutable once produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// The document body as markdown
    pub markdown: String,
    /// Images in document order
    #[serde(default)]
    pub images: Vec<DocumentImage>,
    /// Tables in document order
    #[serde(default)]
    pub tables: Vec<DocumentTable>,
}

impl ParsedDocument {
    /// Wrap raw markdown text with no multimodal elements
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            images: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Load a plain markdown/text requirement file. Rich formats (PDF,
    /// DOCX) must go through the external converter and be submitted as
    /// a `ParsedDocument` directly.
    pub fn from_text_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let markdown = std::fs::read_to_string(path)?;
        Ok(Self::from_markdown(markdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_markdown() {
        let doc = ParsedDocument::from_markdown("# 需求\n内容");
        assert_eq!(doc.markdown, "# 需求\n内容");
        assert!(doc.images.is_empty());
        assert!(doc.tables.is_empty());
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let doc: ParsedDocument = serde_json::from_str(r#"{"markdown": "text"}"#).unwrap();
        assert_eq!(doc.markdown, "text");
        assert!(doc.images.is_empty());
    }
}
