//! Extraction of actions from a model reply.
//!
//! The reply is expected to carry a `<think>…</think>` reasoning section and
//! then one fenced code block holding either a terminal keyword or a single
//! line of pseudo-code. Only the first extracted action is ever executed.
use std::sync::LazyLock;

use regex::Regex;

use crate::executor::actions::TerminalKeyword;

// Optional language tag is only recognised when it sits alone on the fence line.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[\w+-]*[ \t]*\r?\n)?(.*?)```").expect("fence regex compilation failed")
});

/// Extract the action strings from a reply. An empty result means nothing
/// usable was found.
pub fn parse_code_from_string(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    if TerminalKeyword::parse(trimmed).is_some() {
        return vec![trimmed.to_string()];
    }

    let mut codes = Vec::new();
    for caps in FENCE_RE.captures_iter(response) {
        let block = caps[1].trim();
        if TerminalKeyword::parse(block).is_some() {
            codes.push(block.to_string());
            continue;
        }

        let lines: Vec<&str> = block.split('\n').collect();
        match lines.split_last() {
            Some((last, rest)) if TerminalKeyword::parse(last).is_some() => {
                if !rest.is_empty() {
                    codes.push(rest.join("\n"));
                }
                codes.push(last.to_string());
            }
            _ => codes.push(block.to_string()),
        }
    }

    if codes.is_empty() {
        tracing::debug!(chars = response.len(), "no code block found in response");
    }
    codes
}
