//! Lifecycle event emission on the runtime's broadcast bus.
//!
//! [`EventSink::emit`] is synchronous and is always called from the tool
//! task itself, never from a handler background task, so per-call event
//! order on the bus matches the orchestrator's protocol order.

use gantry_protocol::ToolEvent;
use gantry_protocol::ToolEventKind;
use gantry_protocol::ToolResult;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<ToolEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, kind: ToolEventKind, result: &ToolResult, reason: impl Into<String>) {
        let event = ToolEvent {
            kind,
            result: result.clone(),
            reason: reason.into(),
        };
        if self.tx.send(event).is_err() {
            trace!("tool event dropped: no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_protocol::ToolKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn subscribers_see_events_in_emission_order() {
        let sink = EventSink::new(16);
        let mut rx = sink.subscribe();
        let result = ToolResult::for_kind(ToolKind::FileRead);
        sink.emit(ToolEventKind::ItemStarted, &result, "");
        sink.emit(ToolEventKind::ItemCompleted, &result, "done");

        let first = rx.try_recv().expect("first event");
        let second = rx.try_recv().expect("second event");
        assert_eq!(first.kind, ToolEventKind::ItemStarted);
        assert_eq!(second.kind, ToolEventKind::ItemCompleted);
        assert_eq!(second.reason, "done");
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let sink = EventSink::new(16);
        let result = ToolResult::for_kind(ToolKind::FileRead);
        sink.emit(ToolEventKind::ItemStarted, &result, "");
    }
}
