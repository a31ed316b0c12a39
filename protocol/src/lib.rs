//! Types used to communicate between the tool-execution core and its
//! embedders: tool calls and results, lifecycle events, sandbox/approval
//! policy knobs, and the `update_plan` argument schema.
//!
//! This crate is deliberately free of I/O so that front-ends can depend on
//! it without pulling in the execution machinery.

pub mod models;
pub mod plan_tool;
pub mod protocol;

pub use models::ResponseItem;
pub use models::ToolCall;
pub use models::ToolRequest;
pub use protocol::ApprovalDecision;
pub use protocol::ApprovalPolicy;
pub use protocol::Decision;
pub use protocol::Policy;
pub use protocol::SandboxMode;
pub use protocol::ToolEvent;
pub use protocol::ToolEventKind;
pub use protocol::ToolKind;
pub use protocol::ToolResult;
pub use protocol::ToolStatus;
