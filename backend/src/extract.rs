//! Recovers the JSON payload from oracle text that may be wrapped in prose
//! or markdown code fences.

use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    // (?s): the block body may span lines. Lazy so the first closing fence wins.
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence pattern is valid")
});

/// Placeholder returned when nothing usable is found. It parses, but carries
/// no action, so it is rejected downstream with a clear message.
pub const EMPTY_OBJECT: &str = "{}";

/// Candidate JSON text, in priority order:
/// 1. the contents of the first fenced code block;
/// 2. the greedy span from the first `{` to the last `}` (see [`object_span`]);
/// 3. the trimmed text itself.
pub fn extract(raw: &str) -> &str {
    if let Some(block) = FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        return block.as_str().trim();
    }
    if let Some(span) = object_span(raw) {
        return span;
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        EMPTY_OBJECT
    } else {
        trimmed
    }
}

/// Longest region opening at the first `{` and closing at the last `}`.
/// Anything between two objects is kept, so several objects in one reply
/// fail to parse instead of silently picking one of them.
pub fn object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
