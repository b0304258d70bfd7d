// SPDX-License-Identifier: MIT

//! Summary extraction - best-effort, never fails
//!
//! Rules are tried in order until one yields non-empty text:
//! 1. heading containing 测试覆盖度总结, to end of text
//! 2. heading containing 步骤4, to end of text
//! 3. last headed section that does not look like a table
//! 4. everything before the first table
//! 5. the first 1000 characters

use once_cell::sync::Lazy;
use regex::Regex;

static COVERAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)#+[^\n]*测试覆盖度总结.*").expect("valid regex"));
static STEP4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)#+[^\n]*步骤\s*4.*").expect("valid regex"));
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#+\s*[^\n]+$").expect("valid regex"));
static TABLE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|[^\n]+\|").expect("valid regex"));

/// Extract the narrative summary from a report. Always returns some text
/// for non-empty input.
pub fn extract_summary(markdown: &str) -> String {
    for rule in [
        coverage_section,
        step4_section,
        last_non_table_section,
        text_before_first_table,
        leading_excerpt,
    ] {
        let result = rule(markdown);
        if !result.is_empty() {
            return result;
        }
    }
    String::new()
}

fn coverage_section(markdown: &str) -> String {
    COVERAGE_RE
        .find(markdown)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn step4_section(markdown: &str) -> String {
    STEP4_RE
        .find(markdown)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Last headed section whose first ~100 characters contain no pipe, to
/// avoid re-capturing the test-case table as the "summary"
fn last_non_table_section(markdown: &str) -> String {
    let heading_starts: Vec<usize> = HEADING_RE.find_iter(markdown).map(|m| m.start()).collect();

    for (i, &start) in heading_starts.iter().enumerate().rev() {
        let end = heading_starts
            .get(i + 1)
            .copied()
            .unwrap_or(markdown.len());
        let section = markdown[start..end].trim();
        if section.is_empty() {
            continue;
        }

        let head: String = section.chars().take(100).collect();
        if !head.contains('|') {
            return section.to_string();
        }
    }

    String::new()
}

fn text_before_first_table(markdown: &str) -> String {
    TABLE_LINE_RE
        .find(markdown)
        .map(|m| markdown[..m.start()].trim().to_string())
        .unwrap_or_default()
}

fn leading_excerpt(markdown: &str) -> String {
    markdown.chars().take(1000).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_heading_wins() {
        let md = "# 报告\n\n## 步骤4 其他\n内容\n\n### 测试覆盖度总结\n覆盖了全部需求。\n尾部内容";
        let summary = extract_summary(md);
        assert!(summary.starts_with("### 测试覆盖度总结"));
        assert!(summary.ends_with("尾部内容"));
    }

    #[test]
    fn test_step4_heading_fallback() {
        let md = "# 报告\n\n分析\n\n## 步骤 4 总结\n这是总结内容";
        let summary = extract_summary(md);
        assert!(summary.starts_with("## 步骤 4 总结"));
    }

    #[test]
    fn test_last_non_table_section() {
        let md = "## 用例表\n| A | B |\n| --- | --- |\n| 1 | 2 |\n\n## 结论\n这里是结论文字";
        let summary = extract_summary(md);
        assert_eq!(summary, "## 结论\n这里是结论文字");
    }

    #[test]
    fn test_text_before_first_table() {
        let md = "前置说明文字\n\n| A | B |\n| --- | --- |\n| 1 | 2 |";
        let summary = extract_summary(md);
        assert_eq!(summary, "前置说明文字");
    }

    #[test]
    fn test_fallback_to_first_1000_chars() {
        // No headings, no tables
        let short = "没有任何标题的纯文本内容";
        assert_eq!(extract_summary(short), short);

        let long: String = "字".repeat(1500);
        let summary = extract_summary(&long);
        assert_eq!(summary.chars().count(), 1000);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_summary(""), "");
    }
}
