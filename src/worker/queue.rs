//! Generic queue-backed worker loop.
//!
//! An [`EventQueueWorker`] drains an unbounded FIFO queue on a dedicated
//! task, one item at a time, through an injected [`EventProcessor`]. It can
//! be started, stopped, and fed concurrently; exactly one processing run is
//! alive at a time per worker instance.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──► Active ──stop()──► Stopped ──start()──► Active ...
//! ```
//!
//! - Items offered while `Idle` are buffered until the first `start()`.
//! - Items offered while `Active` wake the processing loop.
//! - Items offered while `Stopped` are dropped; `stop()` also discards
//!   everything still queued and cancels the in-flight run.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::protocol::Event;

// ============================================================================
// EventProcessor
// ============================================================================

/// Behavior seam for a queue worker.
///
/// One worker owns one processor; the processor supplies the per-iteration
/// gate and the per-item work, the worker supplies queueing and scheduling.
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    /// One-time hook invoked on every `start()`, before the loop runs.
    fn prepare(&self) {}

    /// Per-iteration gate; the loop idles while this returns `false`.
    fn can_work(&self) -> bool {
        true
    }

    /// Processes a single dequeued event.
    ///
    /// # Errors
    ///
    /// An error fails this item only; the loop logs it and continues with
    /// the next item.
    async fn process(&self, event: Event) -> Result<()>;
}

// ============================================================================
// Worker State
// ============================================================================

/// Worker lifecycle states, stored as an atomic u8.
const STATE_IDLE: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_STOPPED: u8 = 2;

// ============================================================================
// EventQueueWorker
// ============================================================================

/// Queue-backed single-flight processing loop.
///
/// `offer` never blocks and is safe from any thread; the loop runs on its
/// own spawned task and is the only consumer of the queue.
pub struct EventQueueWorker<P: EventProcessor> {
    /// The injected behavior.
    processor: Arc<P>,
    /// Unbounded FIFO queue.
    queue: Arc<Mutex<VecDeque<Event>>>,
    /// Wakes the loop on offer/start/unblock.
    notify: Arc<Notify>,
    /// Lifecycle state.
    state: Arc<AtomicU8>,
    /// Handle of the processing task, for cancellation.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: EventProcessor> EventQueueWorker<P> {
    /// Creates an idle worker around the given processor.
    #[must_use]
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            state: Arc::new(AtomicU8::new(STATE_IDLE)),
            task: Mutex::new(None),
        }
    }

    /// Returns the injected processor.
    #[inline]
    #[must_use]
    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    /// Appends an event to the queue.
    ///
    /// Never blocks. Wakes the processing loop if the worker is active.
    /// Returns `false` if the worker is stopped, in which case the event is
    /// dropped.
    pub fn offer(&self, event: Event) -> bool {
        match self.state.load(Ordering::SeqCst) {
            STATE_STOPPED => {
                warn!(event_id = %event.id, "Worker stopped; event dropped");
                false
            }
            state => {
                self.queue.lock().push_back(event);
                if state == STATE_ACTIVE {
                    self.notify.notify_one();
                }
                true
            }
        }
    }

    /// Transitions the worker to active and spawns the processing loop.
    ///
    /// Invokes the processor's `prepare()` hook before the loop runs.
    /// Returns `false` (no-op) if the worker is already active.
    pub fn start(&self) -> bool {
        if self.state.swap(STATE_ACTIVE, Ordering::SeqCst) == STATE_ACTIVE {
            return false;
        }

        self.processor.prepare();

        let processor = Arc::clone(&self.processor);
        let queue = Arc::clone(&self.queue);
        let notify = Arc::clone(&self.notify);
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            Self::run_loop(processor, queue, notify, state).await;
        });

        *self.task.lock() = Some(handle);
        true
    }

    /// Stops the worker, cancels the in-flight run, and discards all queued
    /// items.
    ///
    /// Intentional data-loss point, used at session teardown only. The
    /// worker must be `start()`-ed again before it resumes work.
    pub fn stop(&self) {
        self.state.store(STATE_STOPPED, Ordering::SeqCst);

        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }

        let discarded = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };

        if discarded > 0 {
            debug!(discarded, "Worker stopped; queued events discarded");
        }
    }

    /// Wakes a dormant processing loop.
    ///
    /// Used after a gate flip (e.g. unblocking the outbound worker).
    #[inline]
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Returns `true` if the worker is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_ACTIVE
    }

    /// Returns the number of queued events.
    #[inline]
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// The processing loop: dequeue one item at a time while active and the
    /// gate holds, otherwise idle until woken.
    async fn run_loop(
        processor: Arc<P>,
        queue: Arc<Mutex<VecDeque<Event>>>,
        notify: Arc<Notify>,
        state: Arc<AtomicU8>,
    ) {
        debug!("Worker loop started");

        while state.load(Ordering::SeqCst) == STATE_ACTIVE {
            if !processor.can_work() {
                notify.notified().await;
                continue;
            }

            let item = queue.lock().pop_front();
            match item {
                Some(event) => {
                    if let Err(e) = processor.process(event).await {
                        error!(error = %e, "Event processing failed; continuing");
                    }
                }
                None => notify.notified().await,
            }
        }

        debug!("Worker loop terminated");
    }
}

impl<P: EventProcessor> Drop for EventQueueWorker<P> {
    fn drop(&mut self) {
        // The loop task holds clones of the queue internals, not the worker;
        // it must not outlive the last handle to it.
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use serde_json::{Map, json};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::context::ClientContext;
    use crate::error::Error;
    use crate::protocol::EventType;

    /// Processor that forwards processed event tags to a channel.
    struct Recorder {
        tx: mpsc::UnboundedSender<String>,
        gate: AtomicBool,
        fail_tag: Option<String>,
    }

    impl Recorder {
        fn new(tx: mpsc::UnboundedSender<String>) -> Self {
            Self {
                tx,
                gate: AtomicBool::new(true),
                fail_tag: None,
            }
        }

        fn gated(tx: mpsc::UnboundedSender<String>) -> Self {
            Self {
                tx,
                gate: AtomicBool::new(false),
                fail_tag: None,
            }
        }
    }

    #[async_trait]
    impl EventProcessor for Recorder {
        fn can_work(&self) -> bool {
            self.gate.load(Ordering::SeqCst)
        }

        async fn process(&self, event: Event) -> Result<()> {
            let tag = event
                .payload
                .as_ref()
                .and_then(|p| p.get("tag"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            if self.fail_tag.as_deref() == Some(tag.as_str()) {
                return Err(Error::protocol("injected failure"));
            }

            let _ = self.tx.send(tag);
            Ok(())
        }
    }

    fn tagged_event(ctx: &ClientContext, tag: &str) -> Event {
        let mut payload = Map::new();
        payload.insert("tag".to_string(), json!(tag));
        Event::new(ctx, "com.example", EventType::Generic, Some(payload))
    }

    async fn recv_tag(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timely processing")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::new(tx)));

        worker.start();
        for i in 0..10 {
            assert!(worker.offer(tagged_event(&ctx, &format!("e{i}"))));
        }

        for i in 0..10 {
            assert_eq!(recv_tag(&mut rx).await, format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn test_items_buffered_before_start() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::new(tx)));

        // Offered while idle: buffered, not dropped
        for i in 0..3 {
            assert!(worker.offer(tagged_event(&ctx, &format!("boot{i}"))));
        }
        assert_eq!(worker.queue_len(), 3);

        worker.start();
        for i in 0..3 {
            assert_eq!(recv_tag(&mut rx).await, format!("boot{i}"));
        }
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::new(tx)));

        assert!(worker.start());
        assert!(!worker.start());
        assert!(worker.is_active());
    }

    #[tokio::test]
    async fn test_offer_after_stop_drops() {
        let ctx = ClientContext::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::new(tx)));

        worker.start();
        worker.stop();

        assert!(!worker.offer(tagged_event(&ctx, "late")));
        assert_eq!(worker.queue_len(), 0);
        assert!(!worker.is_active());
    }

    #[tokio::test]
    async fn test_stop_discards_queue() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Gate closed: nothing is processed while queued
        let worker = EventQueueWorker::new(Arc::new(Recorder::gated(tx)));

        worker.start();
        for i in 0..5 {
            worker.offer(tagged_event(&ctx, &format!("e{i}")));
        }
        assert_eq!(worker.queue_len(), 5);

        worker.stop();
        assert_eq!(worker.queue_len(), 0);

        // Restart with the gate open: queue was discarded, nothing arrives
        worker.processor().gate.store(true, Ordering::SeqCst);
        worker.start();
        worker.wake();

        let result = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "no discarded event may be processed");
    }

    #[tokio::test]
    async fn test_gate_holds_then_releases() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::gated(tx)));

        worker.start();
        worker.offer(tagged_event(&ctx, "held"));

        // Gate closed: item stays queued
        let early = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(early.is_err());
        assert_eq!(worker.queue_len(), 1);

        // Open the gate and wake the loop
        worker.processor().gate.store(true, Ordering::SeqCst);
        worker.wake();

        assert_eq!(recv_tag(&mut rx).await, "held");
    }

    #[tokio::test]
    async fn test_processing_error_does_not_stop_loop() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recorder = Recorder::new(tx);
        recorder.fail_tag = Some("poison".to_string());
        let worker = EventQueueWorker::new(Arc::new(recorder));

        worker.start();
        worker.offer(tagged_event(&ctx, "first"));
        worker.offer(tagged_event(&ctx, "poison"));
        worker.offer(tagged_event(&ctx, "second"));

        assert_eq!(recv_tag(&mut rx).await, "first");
        // "poison" failed and was skipped
        assert_eq!(recv_tag(&mut rx).await, "second");
    }

    #[tokio::test]
    async fn test_restart_after_stop_resumes_work() {
        let ctx = ClientContext::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = EventQueueWorker::new(Arc::new(Recorder::new(tx)));

        worker.start();
        worker.stop();
        assert!(worker.start());

        worker.offer(tagged_event(&ctx, "resumed"));
        assert_eq!(recv_tag(&mut rx).await, "resumed");
    }
}
