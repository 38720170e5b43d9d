//! Tolerant JSON recovery for raw model output.
//!
//! Local models routinely produce almost-JSON: trailing chat tokens, a second
//! object after the first, output cut off mid-string, raw newlines inside
//! string literals, or `\_` escapes. Each stage below rewrites the text a bit
//! further and the first stage whose result parses as an object wins. Valid
//! JSON is returned by the first (strict) attempt untouched.

use serde_json::{Map, Value};

use crate::error::{WrapperError, WrapperResult};

const STRAY_TOKENS: &[&str] = &[
    "<|im_end|>",
    "<|im_start|>",
    "<|endoftext|>",
    "</s>",
    "```json",
    "```",
];

const VALID_ESCAPES: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't', 'u'];

type Stage = (&'static str, fn(&str) -> Option<String>);

/// Parse `raw` into a JSON object, repairing common model formatting noise.
///
/// # Errors
///
/// Returns [`WrapperError::Parsing`] when no stage yields a JSON object.
pub fn repair_json(raw: &str) -> WrapperResult<Map<String, Value>> {
    let trimmed = raw.trim();
    let mut last_error = match parse_object(trimmed) {
        Ok(object) => return Ok(object),
        Err(reason) => reason,
    };

    let stages: [Stage; 4] = [
        ("strip_stray_tokens", |text| Some(strip_stray_tokens(text))),
        ("sanitize_strings", |text| Some(sanitize_strings(text))),
        ("extract_object", |text| {
            extract_balanced_object(text).map(str::to_string)
        }),
        ("close_truncated", close_truncated),
    ];

    let mut current = trimmed.to_string();
    for (stage, apply) in stages {
        let Some(candidate) = apply(&current) else {
            continue;
        };
        match parse_object(&candidate) {
            Ok(object) => {
                tracing::debug!(
                    stage,
                    original_length = raw.len(),
                    repaired_length = candidate.len(),
                    "repaired JSON in LLM output"
                );
                return Ok(object);
            }
            Err(reason) => last_error = reason,
        }
        current = candidate;
    }

    Err(WrapperError::Parsing {
        raw: raw.to_string(),
        reason: last_error,
    })
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(format!("expected a JSON object, got `{other}`")),
        Err(error) => Err(error.to_string()),
    }
}

fn strip_stray_tokens(text: &str) -> String {
    let mut stripped = text.to_string();
    for token in STRAY_TOKENS {
        stripped = stripped.replace(token, "");
    }
    stripped.trim().to_string()
}

/// Escape raw control characters inside string literals and drop backslashes
/// that do not start a valid JSON escape (e.g. `\_`).
fn sanitize_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\\' => match chars.peek().copied() {
                Some(next) if VALID_ESCAPES.contains(&next) => {
                    out.push('\\');
                    out.push(next);
                    chars.next();
                }
                Some(_) => {}
                None => out.push('\\'),
            },
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => out.push_str(&format!("\\u{:04x}", u32::from(ch))),
            ch => out.push(ch),
        }
    }
    out
}

/// First balanced `{...}` group in `text` that parses as an object.
///
/// Groups that fail to parse (braces in leading prose) are skipped whole;
/// scanning resumes after them, never inside them.
fn extract_balanced_object(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        let candidate = balanced_group(&text[start..])?;
        if parse_object(candidate).is_ok() {
            return Some(candidate);
        }
        from = start + candidate.len();
    }
    None
}

/// Prefix of `text` (which starts with `{`) up to its matching `}`,
/// ignoring braces inside strings.
fn balanced_group(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Open container while scanning truncated output.
struct Frame {
    closer: char,
    awaiting_key: bool,
}

fn is_literal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '+' | '.')
}

/// Close an object cut off by a token limit.
///
/// An unterminated string value is closed where it stops. A member that is
/// still incomplete (a partial key, a key without its value, a partial
/// literal or number) is dropped, never filled in. The missing closers are
/// then appended in nesting order.
fn close_truncated(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let body = text[start..].trim_end();
    let mut frames: Vec<Frame> = Vec::new();
    // Length of the longest prefix that ends on a complete member.
    let mut complete_len = 0;
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    let mut literal_start: Option<usize> = None;

    for (offset, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                if !string_is_key {
                    complete_len = offset + 1;
                }
            }
            continue;
        }
        if literal_start.is_some() {
            if is_literal_char(ch) {
                continue;
            }
            literal_start = None;
            complete_len = offset;
        }
        match ch {
            '"' => {
                in_string = true;
                string_is_key = frames.last().is_some_and(|frame| frame.awaiting_key);
            }
            '{' | '[' => {
                frames.push(Frame {
                    closer: if ch == '{' { '}' } else { ']' },
                    awaiting_key: ch == '{',
                });
                complete_len = offset + 1;
            }
            '}' | ']' => {
                if frames.last().is_some_and(|frame| frame.closer == ch) {
                    frames.pop();
                    complete_len = offset + 1;
                }
            }
            ':' => {
                if let Some(frame) = frames.last_mut() {
                    frame.awaiting_key = false;
                }
            }
            ',' => {
                if let Some(frame) = frames.last_mut() {
                    frame.awaiting_key = frame.closer == '}';
                }
            }
            ch if is_literal_char(ch) => literal_start = Some(offset),
            _ => {}
        }
    }

    if frames.is_empty() {
        return None;
    }

    let mut repaired = if in_string && !string_is_key {
        let mut open = body.to_string();
        if escaped {
            open.pop();
        }
        open.push('"');
        open
    } else if let Some(literal) = literal_start
        && serde_json::from_str::<Value>(&body[literal..]).is_ok()
    {
        body.to_string()
    } else {
        body[..complete_len].to_string()
    };
    for frame in frames.iter().rev() {
        repaired.push(frame.closer);
    }
    Some(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_ignores_braces_inside_strings() {
        let text = r#"noise {"a": "}{", "b": {"c": 1}} trailing {"x": 2}"#;
        assert_eq!(
            extract_balanced_object(text),
            Some(r#"{"a": "}{", "b": {"c": 1}}"#)
        );
    }

    #[test]
    fn extract_returns_none_for_unbalanced() {
        assert_eq!(extract_balanced_object(r#"{"a": {"b": 1}"#), None);
    }

    #[test]
    fn extract_skips_braces_in_leading_prose() {
        assert_eq!(
            extract_balanced_object(r#"Use {braces} carefully: {"f": {}} then {"g": 1}"#),
            Some(r#"{"f": {}}"#)
        );
    }

    #[test]
    fn close_truncated_terminates_string_and_objects() {
        let repaired = close_truncated(r#"{"params": {"message": "hel"#);
        assert_eq!(repaired.as_deref(), Some(r#"{"params": {"message": "hel"}}"#));
    }

    #[test]
    fn close_truncated_drops_dangling_comma() {
        assert_eq!(
            close_truncated(r#"{"a": [1, 2,"#).as_deref(),
            Some(r#"{"a": [1, 2]}"#)
        );
    }

    #[test]
    fn close_truncated_drops_key_without_value() {
        assert_eq!(close_truncated(r#"{"a":"#).as_deref(), Some("{}"));
        assert_eq!(
            close_truncated(r#"{"a": "x", "b": "#).as_deref(),
            Some(r#"{"a": "x"}"#)
        );
        assert_eq!(
            close_truncated(r#"{"a": {"b": 1}, "c"#).as_deref(),
            Some(r#"{"a": {"b": 1}}"#)
        );
    }

    #[test]
    fn close_truncated_drops_partial_literals() {
        assert_eq!(
            close_truncated(r#"{"a": "x", "flag": tru"#).as_deref(),
            Some(r#"{"a": "x"}"#)
        );
        assert_eq!(close_truncated(r#"{"n": 1."#).as_deref(), Some("{}"));
        assert_eq!(
            close_truncated(r#"{"n": [1, -"#).as_deref(),
            Some(r#"{"n": [1]}"#)
        );
    }

    #[test]
    fn close_truncated_keeps_complete_trailing_literal() {
        assert_eq!(
            close_truncated(r#"{"ok": true"#).as_deref(),
            Some(r#"{"ok": true}"#)
        );
        assert_eq!(
            close_truncated(r#"{"n": [1, 20"#).as_deref(),
            Some(r#"{"n": [1, 20]}"#)
        );
    }

    #[test]
    fn close_truncated_skips_balanced_input() {
        assert_eq!(close_truncated(r#"{"a": 1}"#), None);
    }

    #[test]
    fn sanitize_escapes_newlines_only_inside_strings() {
        let text = "{\n\"a\": \"line1\nline2\"\n}";
        assert_eq!(sanitize_strings(text), "{\n\"a\": \"line1\\nline2\"\n}");
    }

    #[test]
    fn sanitize_drops_invalid_escapes() {
        assert_eq!(
            sanitize_strings(r#"{"f": "core\_memory\_append", "q": "\"ok\""}"#),
            r#"{"f": "core_memory_append", "q": "\"ok\""}"#
        );
    }

    #[test]
    fn strip_removes_chat_tokens() {
        assert_eq!(strip_stray_tokens("{\"a\": 1}<|im_end|>"), "{\"a\": 1}");
    }
}
