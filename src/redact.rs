//! Redaction rules for text that may be logged or echoed.
//!
//! Provider body fragments, audit summaries, and error messages all pass
//! through [`scrub`] before leaving the process in any observable form.
//! Substitutions run in a fixed order; the result is truncated to 240
//! characters.

use std::sync::LazyLock;

use regex::Regex;

const MAX_SNIPPET_LEN: usize = 240;

/// Response headers safe to surface in diagnostics, in the order they are
/// rendered. Everything else is discarded.
pub const HEADER_WHITELIST: [&str; 8] = [
    "content-type",
    "x-request-id",
    "request-id",
    "trace-id",
    "x-trace-id",
    "x-mimo-request-id",
    "retry-after",
    "status",
];

static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"api[-_]?key"\s*:\s*"[^"]+""#,
        r#"(?i)"access[-_]?token"\s*:\s*"[^"]+""#,
        r#"(?i)"token"\s*:\s*"[^"]+""#,
        r#"(?i)"authorization"\s*:\s*"[^"]+""#,
        r"(?i)(?:sk|rk)-[a-z0-9]{8,}",
        r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}",
        r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b",
        r"\b\d{3}-\d{2}-\d{4}\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction pattern is valid"))
    .collect()
});

/// Replace every sensitive fragment with `[REDACTED]`, then truncate.
pub fn scrub(text: &str) -> String {
    let mut out = text.trim().to_string();
    if out.is_empty() {
        return out;
    }
    for pattern in REDACTION_PATTERNS.iter() {
        out = pattern.replace_all(&out, "[REDACTED]").into_owned();
    }
    truncate(out)
}

fn truncate(text: String) -> String {
    if text.len() <= MAX_SNIPPET_LEN {
        return text;
    }
    let mut cut = MAX_SNIPPET_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
