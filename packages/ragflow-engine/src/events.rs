//! Event Bus (C8): a single-producer, multi-consumer fan-out of
//! `FlowEvent`s. The engine is the sole producer; logging is one consumer
//! among possibly several, subscribed the same way any other consumer
//! would be. Each subscriber gets its own unbounded queue, so a consumer
//! that is slow, stalled, or dropped never blocks the engine and never
//! loses an event to a shared channel's capacity — backpressure (unbounded
//! memory growth on a stuck consumer) is entirely that consumer's problem.

use std::sync::{Arc, Mutex};

use ragflow_core::FlowEvent;
use tokio::sync::mpsc;
use tracing::info;

/// The producing half, owned by the engine for the duration of one run.
/// Cloning shares the same subscriber list — every subscriber registered
/// before or after the clone still observes every event emitted through
/// either handle.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<FlowEvent>>>>,
}

/// A consuming half. Drop it to unsubscribe; the engine is never notified
/// and never waits on subscriber liveness.
pub struct EventSubscriber {
    receiver: mpsc::UnboundedReceiver<FlowEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(sender);
        EventSubscriber { receiver }
    }

    /// Publish an event. Also logs it at INFO level unconditionally — the
    /// bus's own built-in consumer, present regardless of whether any
    /// caller subscribes. Every live subscriber receives every event, in
    /// the order `emit` is called; a subscriber whose receiver has been
    /// dropped is pruned rather than left to error on every future emit.
    pub fn emit(&self, event: FlowEvent) {
        info!(
            event_type = ?event.event_type,
            execution_id = %event.execution_id,
            node_id = event.node_id.as_deref().unwrap_or(""),
            "flow event"
        );
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber {
    /// Await the next event. Returns `None` once the bus (and every clone
    /// of its sender) has been dropped. Because each subscriber owns an
    /// unbounded queue, `recv` never skips an event regardless of how far
    /// behind this consumer falls relative to the engine or to other
    /// subscribers.
    pub async fn recv(&mut self) -> Option<FlowEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::FlowEventType;

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(FlowEvent::flow(FlowEventType::FlowStart, "exec-1"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.execution_id, "exec-1");
        assert_eq!(event.event_type, FlowEventType::FlowStart);
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(FlowEvent::flow(FlowEventType::FlowStart, "exec-1"));
    }

    #[tokio::test]
    async fn dropping_subscriber_does_not_affect_bus() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe();
        }
        bus.emit(FlowEvent::flow(FlowEventType::FlowEnd, "exec-2"));
    }

    #[tokio::test]
    async fn a_lagging_subscriber_loses_no_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        for i in 0..2000 {
            bus.emit(FlowEvent::flow(FlowEventType::NodeStart, format!("exec-{i}")));
        }
        for i in 0..2000 {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.execution_id, format!("exec-{i}"));
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_see_every_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.emit(FlowEvent::flow(FlowEventType::FlowStart, "exec-1"));
        assert_eq!(first.recv().await.unwrap().execution_id, "exec-1");
        assert_eq!(second.recv().await.unwrap().execution_id, "exec-1");
    }
}
