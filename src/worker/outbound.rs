//! Outbound event queue worker.
//!
//! Specializes the generic worker to emit events to the collector. The loop
//! is gated twice: the worker must be explicitly unblocked (handshake
//! received) and the connection must be open. On every start the worker
//! primes the collector with a client-info event, bypassing the queue.
//!
//! Oversized events are split by the chunker; fragments of one event are
//! written in ascending `chunkSequenceNumber` order with no interleaving.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ClientContext;
use crate::error::{Error, Result};
use crate::protocol::{Event, MAX_FRAME_BYTES, MAX_PAYLOAD_BYTES, chunk_event};
use crate::transport::{Connection, SocketState};
use crate::worker::queue::{EventProcessor, EventQueueWorker};

// ============================================================================
// Types
// ============================================================================

/// Supplies the device/client payload for the connect-time client-info event.
///
/// Metadata collection itself is a host-application concern; the engine only
/// wraps the map in an event.
pub type ClientInfoProvider = Arc<dyn Fn() -> Map<String, Value> + Send + Sync>;

// ============================================================================
// OutboundProcessor
// ============================================================================

/// Processing behavior of the outbound worker.
struct OutboundProcessor {
    /// Active connection, swapped by the session across reconnects.
    connection: Mutex<Option<Arc<Connection>>>,
    /// Handshake gate; starts blocked.
    blocked: AtomicBool,
    /// Event sequencing context.
    ctx: Arc<ClientContext>,
    /// Client-info payload source.
    client_info: ClientInfoProvider,
}

impl OutboundProcessor {
    /// Returns the current connection if it is open.
    fn open_connection(&self) -> Option<Arc<Connection>> {
        self.connection
            .lock()
            .as_ref()
            .filter(|c| c.state() == SocketState::Open)
            .map(Arc::clone)
    }

    /// Sends the client-info event directly, bypassing the queue.
    ///
    /// No-op once the worker has been unblocked, so re-invoking it on a
    /// restarted worker is safe.
    fn send_client_info_event(&self) {
        if !self.blocked.load(Ordering::SeqCst) {
            return;
        }

        let Some(connection) = self.open_connection() else {
            warn!("No open connection; client-info event not sent");
            return;
        };

        let event = Event::client_info(&self.ctx, (self.client_info)());
        match event.to_wire_json() {
            Ok(json) => {
                if let Err(e) = connection.send(json) {
                    warn!(error = %e, "Failed to send client-info event");
                } else {
                    debug!(event_id = %event.id, "Client-info event sent");
                }
            }
            Err(e) => warn!(error = %e, "Client-info serialization failed"),
        }
    }
}

#[async_trait]
impl EventProcessor for OutboundProcessor {
    fn prepare(&self) {
        self.send_client_info_event();
    }

    fn can_work(&self) -> bool {
        !self.blocked.load(Ordering::SeqCst) && self.open_connection().is_some()
    }

    async fn process(&self, event: Event) -> Result<()> {
        let connection = self.open_connection().ok_or(Error::ConnectionClosed)?;
        let json = event.to_wire_json()?;

        if json.len() <= MAX_FRAME_BYTES {
            return connection.send(json);
        }

        if !event.has_payload() {
            // Metadata is non-chunkable; nothing can be split off
            warn!(
                event_id = %event.id,
                size = json.len(),
                "Oversized event without payload dropped"
            );
            return Err(Error::oversized_event(json.len()));
        }

        let chunks = chunk_event(&self.ctx, &event, MAX_PAYLOAD_BYTES);
        if chunks.is_empty() {
            return Err(Error::chunking_failed("chunker returned no fragments"));
        }

        debug!(event_id = %event.id, fragments = chunks.len(), "Sending chunked event");
        for chunk in chunks {
            connection.send(chunk.to_wire_json()?)?;
        }
        Ok(())
    }
}

// ============================================================================
// OutboundQueueWorker
// ============================================================================

/// Queue worker for the application → collector direction.
///
/// Created once per session and reused across reconnects; the session swaps
/// the active connection in and re-primes the client-info event.
pub struct OutboundQueueWorker {
    inner: EventQueueWorker<OutboundProcessor>,
}

impl OutboundQueueWorker {
    /// Creates a blocked, idle outbound worker.
    #[must_use]
    pub fn new(ctx: Arc<ClientContext>, client_info: ClientInfoProvider) -> Self {
        let processor = OutboundProcessor {
            connection: Mutex::new(None),
            blocked: AtomicBool::new(true),
            ctx,
            client_info,
        };
        Self {
            inner: EventQueueWorker::new(Arc::new(processor)),
        }
    }

    /// Installs the connection used for sending.
    pub fn set_connection(&self, connection: Arc<Connection>) {
        *self.inner.processor().connection.lock() = Some(connection);
    }

    /// Drops the current connection reference.
    pub fn clear_connection(&self) {
        *self.inner.processor().connection.lock() = None;
    }

    /// Queues an event for transmission. See [`EventQueueWorker::offer`].
    pub fn offer(&self, event: Event) -> bool {
        self.inner.offer(event)
    }

    /// Starts the worker; primes the client-info event via `prepare()`.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// Stops the worker and discards queued events.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Engages the handshake gate; queued traffic stops flowing.
    pub fn block(&self) {
        self.inner.processor().blocked.store(true, Ordering::SeqCst);
    }

    /// Releases the handshake gate and wakes the loop.
    pub fn unblock(&self) {
        self.inner.processor().blocked.store(false, Ordering::SeqCst);
        self.inner.wake();
    }

    /// Returns `true` while the handshake gate is engaged.
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.inner.processor().blocked.load(Ordering::SeqCst)
    }

    /// Re-sends the client-info event on an already started worker.
    ///
    /// Idempotent: a no-op once the worker has been unblocked.
    pub fn send_client_info_event(&self) {
        self.inner.processor().send_client_info_event();
    }

    /// Returns the number of queued events.
    #[inline]
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.queue_len()
    }

    /// Returns `true` if the worker is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::protocol::EventType;
    use crate::protocol::chunker::{METADATA_KEY_CHUNK_SEQUENCE, PAYLOAD_KEY_CHUNK_DATA};
    use crate::test_support::MockCollector;

    fn provider() -> ClientInfoProvider {
        Arc::new(|| {
            let mut payload = Map::new();
            payload.insert("deviceName".to_string(), json!("test-device"));
            payload
        })
    }

    async fn connected_worker(
        collector: &MockCollector,
    ) -> (OutboundQueueWorker, Arc<Connection>, Arc<ClientContext>) {
        let ctx = Arc::new(ClientContext::new());
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let connection = Arc::new(
            Connection::open(&collector.url, signal_tx)
                .await
                .expect("open"),
        );

        let worker = OutboundQueueWorker::new(Arc::clone(&ctx), provider());
        worker.set_connection(Arc::clone(&connection));
        (worker, connection, ctx)
    }

    fn small_event(ctx: &ClientContext, tag: &str) -> Event {
        let mut payload = Map::new();
        payload.insert("tag".to_string(), json!(tag));
        Event::new(ctx, "com.example", EventType::Generic, Some(payload))
    }

    async fn recv_frame(collector: &mut MockCollector) -> Value {
        let text = timeout(Duration::from_secs(2), collector.frames.recv())
            .await
            .expect("timely frame")
            .expect("collector running");
        serde_json::from_str(&text).expect("frame is JSON")
    }

    #[tokio::test]
    async fn test_client_info_sent_on_start_while_blocked() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, _ctx) = connected_worker(&collector).await;

        worker.start();

        let frame = recv_frame(&mut collector).await;
        assert_eq!(frame["type"], json!("clientInfo"));
        assert_eq!(frame["payload"]["deviceName"], json!("test-device"));
    }

    #[tokio::test]
    async fn test_client_info_idempotent_after_unblock() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, _ctx) = connected_worker(&collector).await;

        worker.start();
        let first = recv_frame(&mut collector).await;
        assert_eq!(first["type"], json!("clientInfo"));

        worker.unblock();
        worker.send_client_info_event();

        // No further frame arrives
        let extra = timeout(Duration::from_millis(300), collector.frames.recv()).await;
        assert!(extra.is_err(), "client-info must not be re-sent once unblocked");
    }

    #[tokio::test]
    async fn test_buffered_events_flush_in_order_after_unblock() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, ctx) = connected_worker(&collector).await;

        // Buffered while blocked
        for i in 0..3 {
            assert!(worker.offer(small_event(&ctx, &format!("e{i}"))));
        }

        worker.start();
        let frame = recv_frame(&mut collector).await;
        assert_eq!(frame["type"], json!("clientInfo"));

        // Still blocked: nothing flows
        let held = timeout(Duration::from_millis(200), collector.frames.recv()).await;
        assert!(held.is_err());
        assert_eq!(worker.queue_len(), 3);

        worker.unblock();
        for i in 0..3 {
            let frame = recv_frame(&mut collector).await;
            assert_eq!(frame["payload"]["tag"], json!(format!("e{i}")));
        }
    }

    #[tokio::test]
    async fn test_event_at_frame_ceiling_sent_unchunked() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, ctx) = connected_worker(&collector).await;

        worker.start();
        let _client_info = recv_frame(&mut collector).await;
        worker.unblock();

        // Grow the payload until the wire form hits the ceiling exactly
        let probe = small_event(&ctx, "");
        let overhead = probe.to_wire_json().expect("serialize").len();
        let event = small_event(&ctx, &"x".repeat(MAX_FRAME_BYTES - overhead));
        assert_eq!(event.to_wire_json().expect("serialize").len(), MAX_FRAME_BYTES);

        worker.offer(event);
        let frame = recv_frame(&mut collector).await;
        assert!(frame.get("metadata").is_none(), "no chunk metadata expected");
    }

    #[tokio::test]
    async fn test_oversized_event_is_chunked_in_order() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, ctx) = connected_worker(&collector).await;

        worker.start();
        let _client_info = recv_frame(&mut collector).await;
        worker.unblock();

        let event = small_event(&ctx, &"x".repeat(MAX_FRAME_BYTES));
        worker.offer(event);
        // A follow-up event must arrive after every fragment
        worker.offer(small_event(&ctx, "after"));

        let mut sequences = Vec::new();
        loop {
            let frame = recv_frame(&mut collector).await;
            if frame["payload"].get("tag") == Some(&json!("after")) {
                break;
            }
            assert!(frame["payload"].get(PAYLOAD_KEY_CHUNK_DATA).is_some());
            sequences.push(frame["metadata"][METADATA_KEY_CHUNK_SEQUENCE].as_u64().expect("seq"));
        }

        assert!(sequences.len() >= 2);
        let expected: Vec<u64> = (0..sequences.len() as u64).collect();
        assert_eq!(sequences, expected, "fragments must stay contiguous and ordered");
    }

    #[tokio::test]
    async fn test_oversized_event_without_payload_dropped() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, ctx) = connected_worker(&collector).await;

        worker.start();
        let _client_info = recv_frame(&mut collector).await;
        worker.unblock();

        // Oversized metadata, no payload: non-chunkable, dropped
        let mut metadata = Map::new();
        metadata.insert("annotation".to_string(), json!("m".repeat(MAX_FRAME_BYTES)));
        let oversized = Event::with_metadata(
            &ctx,
            "com.example",
            EventType::Generic,
            Some(metadata),
            None,
        );
        worker.offer(oversized);
        worker.offer(small_event(&ctx, "next"));

        // The dropped event never arrives; the loop continues with the next
        let frame = recv_frame(&mut collector).await;
        assert_eq!(frame["payload"]["tag"], json!("next"));
    }

    #[tokio::test]
    async fn test_block_stops_flow_again() {
        let mut collector = MockCollector::spawn().await;
        let (worker, _connection, ctx) = connected_worker(&collector).await;

        worker.start();
        let _client_info = recv_frame(&mut collector).await;
        worker.unblock();

        worker.offer(small_event(&ctx, "one"));
        let frame = recv_frame(&mut collector).await;
        assert_eq!(frame["payload"]["tag"], json!("one"));

        worker.block();
        worker.offer(small_event(&ctx, "held"));
        let held = timeout(Duration::from_millis(200), collector.frames.recv()).await;
        assert!(held.is_err());

        worker.unblock();
        let frame = recv_frame(&mut collector).await;
        assert_eq!(frame["payload"]["tag"], json!("held"));
    }
}
