//! Extraction of a structured verdict from free-form review text.
//!
//! Deterministic for identical input. Text that does not follow the expected
//! layout yields [`CompletionStatus::Unknown`] and empty lists.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Complete,
    Incomplete,
    Partial,
    Unknown,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "COMPLETE",
            CompletionStatus::Incomplete => "INCOMPLETE",
            CompletionStatus::Partial => "PARTIAL",
            CompletionStatus::Unknown => "UNKNOWN",
        }
    }

    fn from_token(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "COMPLETE" => CompletionStatus::Complete,
            "INCOMPLETE" => CompletionStatus::Incomplete,
            "PARTIAL" => CompletionStatus::Partial,
            _ => CompletionStatus::Unknown,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewExtraction {
    pub status: CompletionStatus,
    pub outstanding_items: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn extract_review(text: &str) -> ReviewExtraction {
    ReviewExtraction {
        status: extract_status(text),
        outstanding_items: extract_section(text, "outstanding"),
        recommendations: extract_section(text, "recommendation"),
    }
}

fn status_any_case() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(incomplete|complete|partial)\b").expect("valid regex"))
}

fn status_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(INCOMPLETE|COMPLETE|PARTIAL)\b").expect("valid regex"))
}

fn bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+)$").expect("valid regex"))
}

/// The single status token on `line`, if it names exactly one
fn single_status(re: &Regex, line: &str) -> Option<CompletionStatus> {
    let found: BTreeSet<CompletionStatus> = re
        .find_iter(line)
        .map(|m| CompletionStatus::from_token(m.as_str()))
        .collect();
    match found.len() {
        1 => found.into_iter().next(),
        _ => None,
    }
}

/// Completion status named by the review.
///
/// Lines mentioning "status" (and the first non-empty line after each) are
/// tried first, matching the token in any case. Otherwise the first line
/// carrying exactly one upper-case token wins. Lines naming several different
/// statuses are ambiguous and skipped.
pub fn extract_status(text: &str) -> CompletionStatus {
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if !line.to_lowercase().contains("status") {
            continue;
        }
        if let Some(status) = single_status(status_any_case(), line) {
            return status;
        }
        let next = lines[i + 1..].iter().find(|l| !l.trim().is_empty());
        if let Some(status) = next.and_then(|l| single_status(status_any_case(), l)) {
            return status;
        }
    }

    lines
        .iter()
        .find_map(|line| single_status(status_upper(), line))
        .unwrap_or(CompletionStatus::Unknown)
}

fn is_bullet(line: &str) -> bool {
    bullet().is_match(line)
}

/// Label before the first colon, when the line reads like `Label: value`
fn colon_label(line: &str) -> Option<&str> {
    let (label, _) = line.split_once(':')?;
    let label = label.trim_matches(|c: char| matches!(c, '#' | '*' | '_') || c.is_whitespace());
    let words = label.split_whitespace().count();
    (1..=4).contains(&words).then_some(label)
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_bullet(line) {
        return false;
    }
    trimmed.starts_with('#')
        || trimmed.trim_end_matches(['*', '_']).ends_with(':')
        || (trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with("**"))
        || colon_label(trimmed).is_some()
}

/// Heading text matched against a section keyword
fn heading_title(line: &str) -> String {
    colon_label(line).unwrap_or(line).to_lowercase()
}

fn clean_item(raw: &str) -> Option<String> {
    let item = raw.replace("**", "");
    let item = item.trim();
    let lowered = item.trim_end_matches('.').to_lowercase();
    if item.is_empty() || lowered == "none" || lowered == "n/a" {
        None
    } else {
        Some(item.to_string())
    }
}

/// Bulleted items under the first heading containing `keyword`.
///
/// Text after a colon on the heading line counts as an item. Collection stops
/// at the next heading, or at the first non-bullet line once items were found.
pub fn extract_section(text: &str, keyword: &str) -> Vec<String> {
    let keyword = keyword.to_lowercase();
    let mut lines = text.lines();
    let mut items = Vec::new();

    let Some(heading) = lines
        .by_ref()
        .find(|line| is_heading(line) && heading_title(line).contains(&keyword))
    else {
        return items;
    };

    if let Some((_, inline)) = heading.split_once(':') {
        let inline = inline.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());
        if let Some(item) = clean_item(inline) {
            items.push(item);
        }
    }

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if is_heading(line) {
            break;
        }
        match bullet().captures(line) {
            Some(caps) => {
                if let Some(item) = caps.get(1).and_then(|m| clean_item(m.as_str())) {
                    items.push(item);
                }
            }
            None if !items.is_empty() => break,
            None => {}
        }
    }
    items
}
