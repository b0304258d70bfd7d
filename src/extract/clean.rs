// SPDX-License-Identifier: MIT

//! Cell content cleanup
//!
//! LLM-generated table cells routinely contain `<br>` tags, HTML entities
//! and stray markup. Cleanup converts them to plain spreadsheet-friendly
//! text. Malformed references stay literal; a bad cell never aborts
//! extraction.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static DECIMAL_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(\d+);").expect("valid regex"));
static HEX_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#x([0-9a-fA-F]+);").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static HSPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Fixed table of named HTML entities handled in cell text
const NAMED_ENTITIES: [(&str, &str); 13] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&mdash;", "—"),
    ("&ndash;", "–"),
    ("&hellip;", "…"),
    ("&copy;", "©"),
    ("&reg;", "®"),
    ("&trade;", "™"),
];

/// Clean one cell. Idempotent on already-clean text. Problems that leave
/// content literal (undecodable character references) are pushed onto
/// `diagnostics` instead of being silently discarded.
pub fn clean_cell(content: &str, diagnostics: &mut Vec<String>) -> String {
    if content.is_empty() {
        return String::new();
    }

    // Line-break tags become literal newlines
    let mut result = BR_RE.replace_all(content, "\n").into_owned();

    for (entity, replacement) in NAMED_ENTITIES {
        if result.contains(entity) {
            result = result.replace(entity, replacement);
        }
    }

    // Numeric and hex character references; undecodable ones stay literal
    result = DECIMAL_REF_RE
        .replace_all(&result, |caps: &Captures| {
            match caps[1].parse::<u32>().ok().and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => {
                    diagnostics.push(format!("undecodable character reference {}", &caps[0]));
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    result = HEX_REF_RE
        .replace_all(&result, |caps: &Captures| {
            match u32::from_str_radix(&caps[1], 16).ok().and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => {
                    diagnostics.push(format!("undecodable character reference {}", &caps[0]));
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    // Strip residual tag-like markup (<p>, <span>, ...)
    result = TAG_RE.replace_all(&result, "").into_owned();

    // Collapse horizontal whitespace, keep newlines; cap blank runs
    result = HSPACE_RE.replace_all(&result, " ").into_owned();
    result = BLANK_RUN_RE.replace_all(&result, "\n\n").into_owned();

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(content: &str) -> String {
        clean_cell(content, &mut Vec::new())
    }

    #[test]
    fn test_br_variants_become_newlines() {
        assert_eq!(clean("步骤1<br>步骤2<br/>步骤3<BR />步骤4"), "步骤1\n步骤2\n步骤3\n步骤4");
    }

    #[test]
    fn test_named_entities() {
        assert_eq!(clean("a &amp;&amp; b"), "a && b");
        assert_eq!(clean("&quot;引用&quot;&hellip;"), "\"引用\"…");
        assert_eq!(clean("&nbsp;前后&nbsp;"), "前后");
    }

    #[test]
    fn test_decoded_bracket_pair_is_treated_as_markup() {
        // Entities decode before the tag strip, so a decoded <...> span is
        // removed like any other residual tag
        assert_eq!(clean("a &lt; b &gt; d"), "a d");
        // A lone bracket survives
        assert_eq!(clean("a &lt; b"), "a < b");
    }

    #[test]
    fn test_numeric_and_hex_references() {
        assert_eq!(clean("A&#65;&#x42;"), "AAB");
        assert_eq!(clean("空格&#32;结束"), "空格 结束");
    }

    #[test]
    fn test_malformed_reference_stays_literal_with_diagnostic() {
        let mut diagnostics = Vec::new();
        // 0x110000 is beyond the Unicode range
        let result = clean_cell("bad &#1114112; ref", &mut diagnostics);
        assert_eq!(result, "bad &#1114112; ref");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_residual_tags_stripped() {
        assert_eq!(clean("<p>段落</p><span>内容</span>"), "段落内容");
    }

    #[test]
    fn test_whitespace_collapse_preserves_newlines() {
        assert_eq!(clean("a   b\t\tc\nd"), "a b c\nd");
        assert_eq!(clean("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_idempotent_on_clean_text() {
        let inputs = ["TC-001", "步骤1\n步骤2", "a && b", "多行\n\n内容 带 空格"];
        for input in inputs {
            assert_eq!(clean(input), input, "not a no-op for {:?}", input);
            let once = clean(input);
            assert_eq!(clean(&once), once);
        }
    }

    #[test]
    fn test_empty_cell() {
        assert_eq!(clean(""), "");
    }
}
