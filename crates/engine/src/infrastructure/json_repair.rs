//! Repair of near-valid JSON from LLM output.
//!
//! Models wrap JSON in code fences, leave trailing commas, or slip in
//! comments. This module fixes exactly those mistakes; anything else is a
//! genuine parse failure escalated to the caller.

/// Try to parse `raw` as JSON, repairing trivial mistakes first.
pub fn parse_lenient(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    // Fast path: already valid.
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    let repaired = repair(raw);
    serde_json::from_str(&repaired)
}

/// Apply all repairs: fence stripping, comment removal, trailing commas.
pub fn repair(raw: &str) -> String {
    let stripped = strip_code_fences(raw);
    let without_comments = strip_comments(&stripped);
    strip_trailing_commas(&without_comments)
}

/// Remove a surrounding ```json ... ``` (or bare ```) fence.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        // Models sometimes prepend prose; cut to the first brace.
        if let Some(start) = trimmed.find(['{', '[']) {
            let end = trimmed
                .rfind(['}', ']'])
                .map(|i| i + 1)
                .unwrap_or(trimmed.len());
            if start > 0 || end < trimmed.len() {
                return trimmed[start..end].to_string();
            }
        }
        return trimmed.to_string();
    }

    let after_fence = trimmed
        .trim_start_matches("```")
        .trim_start_matches("json")
        .trim_start_matches("JSON");
    let inner = after_fence.strip_suffix("```").unwrap_or(after_fence);
    inner.trim().to_string()
}

/// Remove `//` line comments outside string literals.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Skip to end of line.
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Remove commas directly before a closing bracket or brace.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                // Drop any comma (plus whitespace) we just emitted.
                while matches!(out.chars().last(), Some(w) if w.is_whitespace()) {
                    out.pop();
                }
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
