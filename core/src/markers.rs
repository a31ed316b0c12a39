//! Extraction of structured tool calls from model output.
//!
//! Two sources, in order of preference:
//!
//! 1. Response items that are explicit function calls. Nothing to guess.
//! 2. Free text, scanned line by line for ```` ```tool ```` fenced blocks
//!    (body parsed as one JSON object) and for single-line inline JSON
//!    objects carrying a `"tool"` field.
//!
//! Model output is untrusted: malformed marker objects are skipped silently
//! and never abort the scan. Stream order is preserved.

use gantry_protocol::ResponseItem;
use gantry_protocol::ToolCall;
use serde_json::Value;
use tracing::trace;

const TOOL_FENCE_OPEN: &str = "```tool";
const FENCE_CLOSE: &str = "```";

/// Converts an explicit function-call response item into a tool call.
pub fn parse_response_item(item: &ResponseItem) -> Option<ToolCall> {
    match item {
        ResponseItem::FunctionCall {
            name,
            arguments,
            call_id,
        } => {
            if name.is_empty() || call_id.is_empty() {
                return None;
            }
            Some(ToolCall {
                id: call_id.clone(),
                name: name.clone(),
                payload: arguments.clone(),
            })
        }
        ResponseItem::OutputText { .. } => None,
    }
}

/// Scans free text for embedded tool markers, returning the calls in stream
/// order. The list may be empty.
pub fn parse_markers(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut fence_body: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match &mut fence_body {
            Some(body) => {
                if trimmed == FENCE_CLOSE {
                    if let Some(call) = marker_to_call(body) {
                        calls.push(call);
                    }
                    fence_body = None;
                } else {
                    body.push_str(line);
                    body.push('\n');
                }
            }
            None => {
                if trimmed == TOOL_FENCE_OPEN {
                    fence_body = Some(String::new());
                } else if trimmed.starts_with('{') && trimmed.ends_with('}') {
                    if let Some(call) = marker_to_call(trimmed) {
                        calls.push(call);
                    }
                }
            }
        }
    }
    // An unterminated fence is dropped: the stream may simply have been cut
    // off, and a partial JSON body would not parse anyway.
    calls
}

fn marker_to_call(body: &str) -> Option<ToolCall> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            trace!("skipping malformed tool marker: {err}");
            return None;
        }
    };
    let object = value.as_object()?;
    let tool = object.get("tool")?.as_str()?;
    let id = object.get("id")?.as_str()?;
    let args = object.get("args")?;
    if tool.is_empty() || id.is_empty() || !args.is_object() {
        return None;
    }
    Some(ToolCall {
        id: id.to_string(),
        name: tool.to_string(),
        payload: args.to_string(),
    })
}
