// src/judge/prompt.rs
//! Batch prompt construction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Document;
use crate::scoring::reputation::host_of;

pub const DEFAULT_SNIPPET_CHARS: usize = 300;

pub const SYSTEM_PROMPT: &str = r#"You are a strategic intelligence analyst. Rate the strategic importance of each news item on a 0-10 scale.

Scale:
- 10: critical breakthrough, major policy shift, supply chain shock.
- 7-9: significant corporate move, key product launch.
- 4-6: routine earnings, incremental updates.
- 0-3: press-release fluff, spam, off-topic.

Answer with a JSON array only:
[
  {"id": "...", "score": 8.5, "reason": "..."}
]
Copy each ID exactly as given."#;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Decode entities, strip tags, collapse whitespace, keep the first `max_chars`.
pub fn snippet(body: &str, max_chars: usize) -> String {
    let decoded = html_escape::decode_html_entities(body);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    collapsed.trim().chars().take(max_chars).collect()
}

fn source_label(doc: &Document) -> String {
    if !doc.source.trim().is_empty() {
        return doc.source.trim().to_string();
    }
    let host = host_of(&doc.url);
    if host.is_empty() {
        "unknown".to_string()
    } else {
        host
    }
}

pub fn build_user_prompt(batch: &[Document], snippet_chars: usize) -> String {
    let mut out = format!("Evaluate these {} items:\n", batch.len());
    for (i, doc) in batch.iter().enumerate() {
        out.push_str(&format!(
            "\n[Item {}]\nID: {}\nTitle: {}\nSource: {}\nSnippet: {}\n",
            i + 1,
            doc.id,
            doc.title.trim(),
            source_label(doc),
            snippet(&doc.body, snippet_chars)
        ));
    }
    out
}
