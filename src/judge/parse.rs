// src/judge/parse.rs
//! Tolerant parsing of judge responses.
//!
//! Models wrap JSON in code fences, prepend prose, quote numbers, and drop
//! fields. Accepted shape is an array of `{"id", "score", "reason"}` objects:
//! `id` may be a string or number, `score` a number or numeric string (missing
//! means 0), `reason` optional. Entries without an id are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::document::JudgeVerdict;

pub const DEFAULT_REASON: &str = "evaluated by judge";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON array in response")]
    NoArray,
    #[error("malformed JSON array: {0}")]
    Malformed(String),
}

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?").expect("fence regex"));

/// Remove Markdown fence markers (```json / ```) wherever they appear, keeping
/// whatever shares their line.
pub fn strip_code_fences(s: &str) -> String {
    RE_FENCE.replace_all(s, "").into_owned()
}

pub fn parse_verdicts(response: &str) -> Result<Vec<JudgeVerdict>, ParseError> {
    let cleaned = strip_code_fences(response);
    let items = extract_array(cleaned.trim())?;
    Ok(items.iter().filter_map(verdict_from_value).collect())
}

/// The whole payload when it is an array, otherwise the first balanced
/// `[...]` span that parses as a JSON array.
fn extract_array(text: &str) -> Result<Vec<Value>, ParseError> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
        return Ok(items);
    }
    let mut first_err: Option<String> = None;
    for (start, _) in text.match_indices('[') {
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        match serde_json::from_str::<Value>(&text[start..start + end]) {
            Ok(Value::Array(items)) => return Ok(items),
            Ok(_) => {}
            Err(e) => {
                first_err.get_or_insert_with(|| e.to_string());
            }
        }
    }
    Err(first_err.map_or(ParseError::NoArray, ParseError::Malformed))
}

/// Byte length of the bracketed span at the start of `s`, honoring JSON strings.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn verdict_from_value(v: &Value) -> Option<JudgeVerdict> {
    let obj = v.as_object()?;
    let document_id = match obj.get("id")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if document_id.is_empty() {
        return None;
    }
    let score = match obj.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();
    Some(JudgeVerdict {
        document_id,
        score: score as f32,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array() {
        let v = parse_verdicts(r#"[{"id":"a","score":8,"reason":"big"}]"#).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].document_id, "a");
        assert_eq!(v[0].score, 8.0);
        assert_eq!(v[0].reason, "big");
    }

    #[test]
    fn fenced_array() {
        let text = "```json\n[{\"id\":\"a\",\"score\":7.5,\"reason\":\"ok\"}]\n```";
        let v = parse_verdicts(text).unwrap();
        assert_eq!(v[0].score, 7.5);
    }

    #[test]
    fn inline_fence_on_one_line() {
        let text = r#"```json [{"id":"a","score":8,"reason":"x"}] ```"#;
        let v = parse_verdicts(text).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].document_id, "a");
        assert_eq!(v[0].score, 8.0);
    }

    #[test]
    fn fence_glued_to_array() {
        let text = "```JSON[{\"id\":\"a\",\"score\":8}]\n```";
        let v = parse_verdicts(text).unwrap();
        assert_eq!(v[0].document_id, "a");
        assert_eq!(v[0].score, 8.0);
        assert_eq!(strip_code_fences("```json\n[1]\n```").trim(), "[1]");
    }

    #[test]
    fn prose_around_array() {
        let text = "Here are my ratings [as requested]:\n[{\"id\":1,\"score\":\"6\"}]\nHope [this] helps.";
        let v = parse_verdicts(text).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].document_id, "1");
        assert_eq!(v[0].score, 6.0);
        assert_eq!(v[0].reason, DEFAULT_REASON);
    }

    #[test]
    fn brackets_inside_strings_do_not_break_extraction() {
        let text = r#"Result: [{"id":"a","score":3,"reason":"mentions [redacted] data"}] done"#;
        let v = parse_verdicts(text).unwrap();
        assert_eq!(v[0].reason, "mentions [redacted] data");
    }

    #[test]
    fn incomplete_entries() {
        let v = parse_verdicts(r#"[{"id":"a"},{"score":9},"junk",{"id":"","score":2},{"id":"b","score":null}]"#)
            .unwrap();
        let ids: Vec<_> = v.iter().map(|x| x.document_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(v[0].score, 0.0);
        assert_eq!(v[1].score, 0.0);
    }

    #[test]
    fn no_array_is_an_error() {
        assert_eq!(parse_verdicts("I cannot help with that."), Err(ParseError::NoArray));
        assert!(matches!(
            parse_verdicts("[{\"id\": \"a\", \"score\": }]"),
            Err(ParseError::Malformed(_))
        ));
    }
}
