pub mod context;
pub mod events;
pub mod handlers;
pub mod orchestrator;
pub mod registry;

pub use context::Invocation;
pub use events::EventSink;
pub use orchestrator::Orchestrator;
pub use registry::ToolHandler;
pub use registry::ToolRegistry;
