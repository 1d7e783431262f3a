//! Extraction of tool calls from free-form model output.
//!
//! Two grammars are recognized, each by its own matcher:
//!
//! - structured blocks: `<tool_call>{"name": "...", "parameters": {...}}</tool_call>`
//! - call tokens: `[TOOL_CALL] name(key="value", other='value')`
//!
//! Call tokens only understand quoted string values; numbers and booleans
//! must be quoted to be picked up.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::ToolCall;

static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex"));

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[TOOL_CALL\]\s*(\w+)\s*\((.*?)\)").expect("valid regex"));

static PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)\s*=\s*["']([^"']*)["']"#).expect("valid regex"));

static STRIP_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>.*?</tool_call>").expect("valid regex"));

static STRIP_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[TOOL_CALL\][^)]*\)").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct BlockBody {
    name: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

/// Calls written as `<tool_call>` JSON blocks, tagged with their byte offset.
pub fn match_blocks(text: &str) -> Vec<(usize, ToolCall)> {
    BLOCK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?.as_str().trim();
            match serde_json::from_str::<BlockBody>(body) {
                Ok(parsed) => Some((
                    whole.start(),
                    ToolCall::new(parsed.name, parsed.parameters.unwrap_or_default()),
                )),
                Err(e) => {
                    debug!("skipping malformed tool_call block: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Calls written as `[TOOL_CALL] name(k="v")` tokens, tagged with their byte offset.
pub fn match_tokens(text: &str) -> Vec<(usize, ToolCall)> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let parameters: Map<String, Value> = PARAM_RE
                .captures_iter(args)
                .map(|p| (p[1].to_string(), Value::String(p[2].to_string())))
                .collect();
            Some((whole.start(), ToolCall::new(name, parameters)))
        })
        .collect()
}

/// All tool calls in `text`, in the order they first appear across both grammars.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut found = match_blocks(text);
    found.extend(match_tokens(text));
    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, call)| call).collect()
}

/// Remove every tool-call fragment of either grammar.
pub fn strip_tool_calls(text: &str) -> String {
    let without_blocks = STRIP_BLOCK_RE.replace_all(text, "");
    STRIP_TOKEN_RE.replace_all(&without_blocks, "").trim().to_string()
}
