//! Model-facing shapes: the items a response stream yields and the tool-call
//! representation the dispatcher consumes.

use crate::protocol::ToolKind;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

/// One structured tool invocation extracted from model output. Immutable
/// once built; `id` is the correlation key across every event and approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument object, decoded by the handler that owns the tool.
    pub payload: String,
}

/// Item yielded by the model stream: either an explicit function call or a
/// chunk of free text that may embed tool markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    FunctionCall {
        name: String,
        arguments: String,
        call_id: String,
    },
    OutputText {
        text: String,
    },
}

/// Higher-level request form used by tests and legacy callers. Converts to a
/// [`ToolCall`] by serializing its fields under the canonical tool name for
/// the kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub kind: Option<ToolKind>,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub patch: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query: String,
}

impl ToolRequest {
    pub fn exec(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Some(ToolKind::CommandExecution),
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn patch(id: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Some(ToolKind::FileChange),
            patch: patch.into(),
            ..Self::default()
        }
    }

    pub fn read(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Some(ToolKind::FileRead),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn into_call(self) -> ToolCall {
        let (name, args) = match self.kind {
            Some(ToolKind::CommandExecution) | None => {
                ("exec_command", json!({ "command": self.command }))
            }
            Some(ToolKind::FileChange) => {
                let mut args = json!({ "patch": self.patch });
                if !self.path.is_empty()
                    && let Some(map) = args.as_object_mut()
                {
                    map.insert("path".to_string(), json!(self.path));
                }
                ("apply_patch", args)
            }
            Some(ToolKind::FileRead) => ("file_read", json!({ "path": self.path })),
            Some(ToolKind::FileSearch) => ("file_search", json!({})),
            Some(ToolKind::PlanUpdate) => ("update_plan", json!({ "plan": [] })),
        };
        ToolCall {
            id: self.id,
            name: name.to_string(),
            payload: args.to_string(),
        }
    }
}
