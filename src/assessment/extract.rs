// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Locate the JSON object inside a model's free-text reply

use tracing::debug;

use crate::{Result, TyrescanError};

/// Extract the first brace-balanced JSON object from `raw`.
///
/// Prose, markdown fences and trailing remarks around the object are
/// ignored. Whitespace runs collapse to single spaces. When several balanced
/// spans exist, the earliest one that parses as a JSON object wins;
/// otherwise the earliest balanced span is returned as is.
pub fn extract_json(raw: &str) -> Result<String> {
    let text = collapse_whitespace(raw);
    let mut spans = balanced_spans(&text);
    spans.sort_unstable_by_key(|&(start, _)| start);

    for &(start, end) in &spans {
        let candidate = &text[start..=end];
        if serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(candidate).is_ok() {
            debug!("Found JSON object at byte {} ({} bytes)", start, candidate.len());
            return Ok(candidate.to_string());
        }
    }

    spans
        .first()
        .map(|&(start, end)| text[start..=end].to_string())
        .ok_or(TyrescanError::NoJsonFound)
}

/// Every balanced `{...}` span as `(open, close)` byte indices, in one pass.
///
/// Quotes only delimit strings inside an open span, so quotes and
/// apostrophes in surrounding prose do not matter. Stray `{` stay open and
/// never close, without hiding the balanced spans nested after them.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
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
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
