//! Session orchestration and reconnect state machine.
//!
//! A [`Session`] owns one connection, the two directional queue workers, and
//! the reconnect policy:
//!
//! ```text
//! Idle ─► AwaitingAuthorization ─► Connecting ─► Open ─► Terminated
//!                                      ▲           │
//!                                      └─ Reconnecting ◄─ abnormal close
//! ```
//!
//! - `connect` gates on a token (empty → interactive authorization) and an
//!   organization id (shared state, falling back to the stored URL).
//! - The handshake control event unblocks outbound traffic; nothing queued
//!   flows before it.
//! - Close codes branch into terminal teardown or a cancellable, fixed-delay
//!   reconnect. Reconnects are suppressed while the authorization UI is up.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::ClientContext;
use crate::identifiers::SessionId;
use crate::protocol::{DisconnectReason, Event};
use crate::session::collaborators::{
    ConnectionStore, ControlDispatcher, SessionListener, SessionPresenter, StateProvider,
};
use crate::session::url::{Environment, build_connection_url, parse_connection_url};
use crate::transport::{Connection, SocketSignal, SocketState};
use crate::worker::{ClientInfoProvider, InboundQueueWorker, OutboundQueueWorker};

// ============================================================================
// Constants
// ============================================================================

/// Fixed delay between reconnect attempts after the first.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Close code used when a dial attempt fails outright.
const DIAL_FAILURE_CLOSE_CODE: u16 = 1006;

// ============================================================================
// SessionConfig
// ============================================================================

/// Static parameters of one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Collector-assigned session identifier.
    pub session_id: SessionId,
    /// Deployment tier of the collector.
    pub environment: Environment,
    /// Collector host name (without the `connect` label).
    pub host: String,
    /// Delay between reconnect attempts after the first.
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    /// Creates a config with the default reconnect delay.
    #[must_use]
    pub fn new(session_id: SessionId, environment: Environment, host: impl Into<String>) -> Self {
        Self {
            session_id,
            environment,
            host: host.into(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Bundle of external collaborators injected into a session.
#[derive(Clone)]
pub struct Collaborators {
    /// Host-application state access.
    pub state: Arc<dyn StateProvider>,
    /// Reconnection URL persistence.
    pub store: Arc<dyn ConnectionStore>,
    /// Presentation notifications and the authorization UI query.
    pub presenter: Arc<dyn SessionPresenter>,
    /// Control-event routing.
    pub dispatcher: Arc<dyn ControlDispatcher>,
}

// ============================================================================
// ListenerId
// ============================================================================

/// Handle for a registered [`SessionListener`], used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ============================================================================
// Session
// ============================================================================

/// Stateful orchestration of one logical collector connection.
///
/// Created when a session identifier is resolved (deep link, stored
/// reconnection URL, or interactive flow); destroyed on terminal disconnect
/// or explicit [`disconnect`](Session::disconnect).
pub struct Session {
    /// Static session parameters.
    config: SessionConfig,
    /// Event sequencing context.
    ctx: Arc<ClientContext>,
    /// External collaborators.
    collaborators: Collaborators,
    /// Active connection, if any.
    connection: Mutex<Option<Arc<Connection>>>,
    /// Outbound (application → collector) worker.
    outbound: OutboundQueueWorker,
    /// Inbound (collector → application) worker.
    inbound: InboundQueueWorker,
    /// Registered lifecycle listeners, keyed by registration handle.
    listeners: Mutex<FxHashMap<ListenerId, Arc<dyn SessionListener>>>,
    /// Source of listener registration handles.
    next_listener_id: AtomicU64,
    /// Signal channel handed to each dialed connection.
    signal_tx: mpsc::UnboundedSender<SocketSignal>,
    /// Current authorization token; may be empty pending authorization.
    token: Mutex<String>,
    /// Reconnect already in progress.
    is_attempting_reconnect: AtomicBool,
    /// Pre-handshake boot events were cleared by an earlier shutdown.
    did_clear_boot_events: AtomicBool,
    /// An abnormal close was already handled since the last successful open.
    seen_abnormal_since_open: AtomicBool,
    /// Terminal state reached; late socket signals are ignored.
    terminated: AtomicBool,
    /// Scheduled reconnect attempt, kept for cancellation.
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// Weak self-handle for tasks spawned from `&self` methods.
    self_ref: Mutex<Weak<Self>>,
}

// ============================================================================
// Session - Construction
// ============================================================================

impl Session {
    /// Creates a session and spawns its signal loop.
    ///
    /// The session is idle until [`connect`](Session::connect) is invoked.
    #[must_use]
    pub fn start(
        config: SessionConfig,
        collaborators: Collaborators,
        client_info: ClientInfoProvider,
        ctx: Arc<ClientContext>,
    ) -> Arc<Self> {
        Self::start_inner(config, collaborators, client_info, ctx, false)
    }

    /// Reconstructs a session from a persisted connection URL and connects.
    ///
    /// Returns `None` when no stored URL exists or it lacks a session id or
    /// token; the caller then falls back to a fresh authorization flow. The
    /// restored session re-enqueues the host state snapshot after its first
    /// handshake, since the original boot events were lost with the previous
    /// process.
    pub fn restore(
        host: impl Into<String>,
        collaborators: Collaborators,
        client_info: ClientInfoProvider,
        ctx: Arc<ClientContext>,
    ) -> Option<Arc<Self>> {
        let stored_url = collaborators.store.stored_connection_url()?;
        let stored = parse_connection_url(&stored_url)?;

        info!(session_id = %stored.session_id, "Resuming session from stored URL");

        let config = SessionConfig::new(stored.session_id, stored.environment, host);
        let session = Self::start_inner(config, collaborators, client_info, ctx, true);
        session.connect(&stored.token);
        Some(session)
    }

    fn start_inner(
        config: SessionConfig,
        collaborators: Collaborators,
        client_info: ClientInfoProvider,
        ctx: Arc<ClientContext>,
        resumed: bool,
    ) -> Arc<Self> {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            config,
            ctx: Arc::clone(&ctx),
            collaborators,
            connection: Mutex::new(None),
            outbound: OutboundQueueWorker::new(ctx, client_info),
            inbound: InboundQueueWorker::new(),
            listeners: Mutex::new(FxHashMap::default()),
            next_listener_id: AtomicU64::new(0),
            signal_tx,
            token: Mutex::new(String::new()),
            is_attempting_reconnect: AtomicBool::new(false),
            did_clear_boot_events: AtomicBool::new(resumed),
            seen_abnormal_since_open: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            reconnect_task: Mutex::new(None),
            self_ref: Mutex::new(Weak::new()),
        });
        *session.self_ref.lock() = Arc::downgrade(&session);

        // Inbound control events: the handshake flips the outbound gate,
        // everything else routes to the dispatcher.
        let weak = Arc::downgrade(&session);
        session.inbound.set_listener(Box::new(move |event| {
            let Some(session) = weak.upgrade() else { return };
            if event.is_handshake_control() {
                session.handle_handshake();
            } else {
                session.collaborators.dispatcher.dispatch(event);
            }
        }));

        // Socket signal loop; ends when the session is dropped.
        let weak = Arc::downgrade(&session);
        tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                let Some(session) = weak.upgrade() else { break };
                session.handle_signal(signal);
            }
            debug!("Session signal loop terminated");
        });

        session
    }
}

// ============================================================================
// Session - Public API
// ============================================================================

impl Session {
    /// Returns the session identifier.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.config.session_id
    }

    /// Returns `true` once the session has reached its terminal state.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Registers a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().insert(id, listener);
        id
    }

    /// Unregisters a listener; returns `false` if the handle was unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Queues an event for transmission to the collector.
    ///
    /// Events enqueued before the handshake are buffered and flushed, in
    /// order, once the collector signals readiness. Returns `false` if the
    /// session is terminated and the event was dropped.
    pub fn enqueue(&self, event: Event) -> bool {
        if self.is_terminated() {
            warn!(event_id = %event.id, "Session terminated; event dropped");
            return false;
        }
        self.outbound.offer(event)
    }

    /// Starts a connection attempt with the given token.
    ///
    /// An empty token signals the need for interactive authorization to the
    /// presenter and halts; no connection attempt is made. A missing
    /// organization identifier abandons the attempt with a logged error.
    pub fn connect(&self, pin: &str) {
        if self.is_terminated() {
            warn!("connect on terminated session ignored");
            return;
        }

        if pin.is_empty() {
            debug!("No token available; requesting interactive authorization");
            self.collaborators
                .presenter
                .on_authorization_needed(&self.config.session_id);
            return;
        }
        *self.token.lock() = pin.to_string();

        let Some(org_id) = self.resolve_org_id() else {
            error!("No organization identifier available; connect abandoned");
            return;
        };

        let url = build_connection_url(
            &self.config.host,
            self.config.environment,
            &self.config.session_id,
            pin,
            &org_id,
            &self.collaborators.state.client_id(),
        );

        self.collaborators.presenter.on_connecting();

        let Some(session) = self.self_ref.lock().upgrade() else {
            return;
        };
        tokio::spawn(async move {
            match Connection::open(&url, session.signal_tx.clone()).await {
                Ok(connection) => {
                    let connection = Arc::new(connection);
                    *session.connection.lock() = Some(Arc::clone(&connection));
                    session.outbound.set_connection(connection);
                    session.handle_opened(&url);
                }
                Err(e) => {
                    warn!(error = %e, "Connection attempt failed");
                    session.handle_closed(DIAL_FAILURE_CLOSE_CODE);
                }
            }
        });
    }

    /// Explicit user-initiated teardown.
    ///
    /// Cancels any scheduled reconnect, closes the connection if open,
    /// clears session data, and notifies listeners of termination.
    pub fn disconnect(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(session_id = %self.config.session_id, "Session disconnecting");
        self.cancel_reconnect();

        let connection = self.connection.lock().take();
        if let Some(connection) = connection
            && connection.state() != SocketState::Closed
        {
            connection.disconnect();
        }

        self.clear_session_data();
        self.notify_terminated();
    }
}

// ============================================================================
// Session - Signal Handling
// ============================================================================

impl Session {
    /// Dispatches one socket signal.
    fn handle_signal(&self, signal: SocketSignal) {
        match signal {
            SocketSignal::Opened => {
                // Post-open wiring happens in the connect task, which owns
                // the ordering of connection installation vs. worker start.
                debug!("Socket opened");
            }

            SocketSignal::Message(text) => match Event::from_wire_json(&text, &self.ctx) {
                Ok(event) => {
                    self.inbound.offer(event);
                }
                Err(e) => {
                    // Malformed inbound frame: drop it, keep the connection
                    warn!(error = %e, "Failed to parse inbound message");
                }
            },

            SocketSignal::Error(message) => {
                warn!(message, "Socket error reported");
            }

            SocketSignal::Closed { code } => {
                self.handle_closed(code);
            }
        }
    }

    /// The connection reached the open state.
    fn handle_opened(&self, url: &str) {
        info!(session_id = %self.config.session_id, "Session connection open");

        self.is_attempting_reconnect.store(false, Ordering::SeqCst);
        self.seen_abnormal_since_open.store(false, Ordering::SeqCst);
        self.collaborators.store.save_connection_url(Some(url));

        self.inbound.start();

        // Re-prime the client-info event if the worker survived an earlier
        // connection attempt; start() runs prepare() on the first pass.
        if !self.outbound.start() {
            self.outbound.send_client_info_event();
        }
    }

    /// The handshake control event arrived; queued traffic may flow.
    fn handle_handshake(&self) {
        info!(session_id = %self.config.session_id, "Handshake received; unblocking outbound");

        self.outbound.unblock();
        self.collaborators.presenter.on_connected();
        for listener in self.listener_snapshot() {
            listener.on_session_connected();
        }

        if self.did_clear_boot_events.swap(false, Ordering::SeqCst) {
            let snapshot = self.collaborators.state.all_state_events();
            debug!(events = snapshot.len(), "Re-enqueueing host state snapshot");
            for event in snapshot {
                self.outbound.offer(event);
            }
        }
    }

    /// The connection closed with the given transport code.
    fn handle_closed(&self, code: u16) {
        if self.is_terminated() {
            debug!(code, "Close signal after termination ignored");
            return;
        }

        let reason = DisconnectReason::from_close_code(code);
        info!(code, ?reason, "Session connection closed");

        self.outbound.clear_connection();
        *self.connection.lock() = None;

        if reason.is_normal() {
            self.terminated.store(true, Ordering::SeqCst);
            self.cancel_reconnect();
            self.clear_session_data();
            self.notify_terminated();
            return;
        }

        if !reason.is_retryable() {
            self.terminated.store(true, Ordering::SeqCst);
            self.cancel_reconnect();
            self.clear_session_data();
            self.collaborators.presenter.on_disconnected(&reason);
            for listener in self.listener_snapshot() {
                listener.on_session_disconnected(&reason);
            }
            self.notify_terminated();
            return;
        }

        // Abnormal close. One-time transition on the first occurrence since
        // the last successful open; a retry on every occurrence.
        if !self.seen_abnormal_since_open.swap(true, Ordering::SeqCst) {
            self.outbound.block();
            self.collaborators.presenter.on_disconnected(&reason);
            for listener in self.listener_snapshot() {
                listener.on_session_disconnected(&reason);
            }
        }

        if self.collaborators.presenter.is_authorization_ui_active() {
            debug!("Authorization UI active; no automatic reconnect scheduled");
            return;
        }

        let delay = if self.is_attempting_reconnect.swap(true, Ordering::SeqCst) {
            self.config.reconnect_delay
        } else {
            Duration::ZERO
        };
        self.schedule_reconnect(delay);
    }
}

// ============================================================================
// Session - Reconnect & Teardown
// ============================================================================

impl Session {
    /// Schedules a reconnect attempt after `delay`.
    fn schedule_reconnect(&self, delay: Duration) {
        self.collaborators.presenter.on_reconnecting();
        debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        let weak = self.self_ref.lock().clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(session) = weak.upgrade() else { return };
            if session.is_terminated() {
                return;
            }

            let token = session.token.lock().clone();
            session.connect(&token);
        });

        // A stale timer must not fire after a newer one was scheduled
        if let Some(previous) = self.reconnect_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancels any scheduled reconnect attempt.
    fn cancel_reconnect(&self) {
        if let Some(handle) = self.reconnect_task.lock().take() {
            handle.abort();
        }
    }

    /// Resolves the organization identifier.
    ///
    /// Shared configuration state first, then the org embedded in a
    /// previously stored reconnection URL.
    fn resolve_org_id(&self) -> Option<String> {
        self.collaborators
            .state
            .org_id(false)
            .filter(|org| !org.is_empty())
            .or_else(|| {
                self.collaborators
                    .store
                    .stored_connection_url()
                    .and_then(|url| parse_connection_url(&url))
                    .and_then(|stored| stored.org_id)
            })
    }

    /// Releases session resources: stored URL, token, both workers.
    fn clear_session_data(&self) {
        self.collaborators.store.save_connection_url(None);
        self.token.lock().clear();
        self.outbound.stop();
        self.inbound.stop();
        self.outbound.clear_connection();
    }

    /// Notifies listeners of terminal teardown.
    fn notify_terminated(&self) {
        for listener in self.listener_snapshot() {
            listener.on_session_terminated();
        }
    }

    /// Clones the current listener set.
    ///
    /// Callbacks run outside the registry lock so they may re-enter
    /// `add_listener`/`remove_listener`.
    fn listener_snapshot(&self) -> Vec<Arc<dyn SessionListener>> {
        self.listeners.lock().values().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
