//! Inbound event queue worker.
//!
//! Specializes the generic worker to consume events arriving from the
//! collector. Only control events flow through the inbound pipeline; any
//! other inbound event type is a protocol violation and is discarded with a
//! warning. Control events are handed to a single registered listener.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::Result;
use crate::protocol::Event;
use crate::worker::queue::{EventProcessor, EventQueueWorker};

// ============================================================================
// Types
// ============================================================================

/// Callback receiving inbound control events.
pub type ControlEventListener = Box<dyn Fn(Event) + Send + Sync>;

// ============================================================================
// InboundProcessor
// ============================================================================

/// Processing behavior of the inbound worker.
struct InboundProcessor {
    /// The single registered listener.
    listener: Mutex<Option<ControlEventListener>>,
}

#[async_trait]
impl EventProcessor for InboundProcessor {
    // can_work: unconditionally true (no gating on the inbound side)

    async fn process(&self, event: Event) -> Result<()> {
        if !event.is_control() {
            warn!(
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                "Non-control inbound event discarded"
            );
            return Ok(());
        }

        trace!(
            event_id = %event.id,
            control_type = event.control_type().unwrap_or_default(),
            "Dispatching control event"
        );

        let listener = self.listener.lock();
        if let Some(ref listener) = *listener {
            listener(event);
        } else {
            warn!("No inbound listener registered; control event dropped");
        }
        Ok(())
    }
}

// ============================================================================
// InboundQueueWorker
// ============================================================================

/// Queue worker for the collector → application direction.
pub struct InboundQueueWorker {
    inner: EventQueueWorker<InboundProcessor>,
}

impl InboundQueueWorker {
    /// Creates an idle inbound worker with no listener.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: EventQueueWorker::new(Arc::new(InboundProcessor {
                listener: Mutex::new(None),
            })),
        }
    }

    /// Registers the single control-event listener, replacing any previous
    /// one.
    pub fn set_listener(&self, listener: ControlEventListener) {
        *self.inner.processor().listener.lock() = Some(listener);
    }

    /// Queues an inbound event. See [`EventQueueWorker::offer`].
    pub fn offer(&self, event: Event) -> bool {
        self.inner.offer(event)
    }

    /// Starts the worker.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// Stops the worker and discards queued events.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Returns `true` if the worker is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

impl Default for InboundQueueWorker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::{Map, json};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::context::ClientContext;
    use crate::protocol::EventType;
    use crate::protocol::event::PAYLOAD_KEY_TYPE;

    fn control_event(ctx: &ClientContext, control_type: &str) -> Event {
        let mut payload = Map::new();
        payload.insert(PAYLOAD_KEY_TYPE.to_string(), json!(control_type));
        Event::new(ctx, "com.relay.mobile", EventType::Control, Some(payload))
    }

    fn listening_worker() -> (InboundQueueWorker, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = InboundQueueWorker::new();
        worker.set_listener(Box::new(move |event| {
            let _ = tx.send(event.control_type().unwrap_or_default().to_string());
        }));
        (worker, rx)
    }

    #[tokio::test]
    async fn test_control_events_reach_listener_in_order() {
        let ctx = ClientContext::new();
        let (worker, mut rx) = listening_worker();

        worker.start();
        for t in ["screenshot", "configUpdate", "startEventForwarding"] {
            worker.offer(control_event(&ctx, t));
        }

        for t in ["screenshot", "configUpdate", "startEventForwarding"] {
            let received = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timely dispatch")
                .expect("listener alive");
            assert_eq!(received, t);
        }
    }

    #[tokio::test]
    async fn test_non_control_events_filtered() {
        let ctx = ClientContext::new();
        let (worker, mut rx) = listening_worker();

        worker.start();
        worker.offer(Event::new(&ctx, "com.example", EventType::Log, None));
        worker.offer(Event::new(&ctx, "com.example", EventType::Generic, None));
        worker.offer(control_event(&ctx, "screenshot"));

        // Only the control event arrives
        let received = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timely dispatch")
            .expect("listener alive");
        assert_eq!(received, "screenshot");

        let extra = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_no_listener_does_not_panic() {
        let ctx = ClientContext::new();
        let worker = InboundQueueWorker::new();

        worker.start();
        worker.offer(control_event(&ctx, "screenshot"));

        // Give the loop a beat; absence of a panic is the assertion
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(worker.is_active());
    }
}
