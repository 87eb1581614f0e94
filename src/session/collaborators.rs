//! Collaborator interfaces at the session boundary.
//!
//! The protocol engine drives these narrow seams and knows nothing about
//! their implementations: presentation (status UI), persistence (reconnect
//! URL), host-application state, and control-event dispatch all live outside
//! the engine.
//!
//! | Trait | Concern |
//! |-------|---------|
//! | [`StateProvider`] | Host state snapshot, org id, client id |
//! | [`ConnectionStore`] | Reconnection URL persistence |
//! | [`SessionPresenter`] | Status notifications and the authorization UI |
//! | [`ControlDispatcher`] | Routing of non-handshake control events |
//! | [`SessionListener`] | Lifecycle callbacks for registered observers |

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::{ClientId, SessionId};
use crate::protocol::{DisconnectReason, Event};

// ============================================================================
// StateProvider
// ============================================================================

/// Supplies host-application state to the session.
pub trait StateProvider: Send + Sync {
    /// Returns the full current application state snapshot as events.
    ///
    /// Re-enqueued after the first successful handshake when pre-handshake
    /// boot events were previously cleared.
    fn all_state_events(&self) -> Vec<Event>;

    /// Returns the organization identifier from shared configuration state.
    ///
    /// `url_encoded` requests the value percent-encoded for direct query
    /// use. A local cache read; must not block on network I/O.
    fn org_id(&self, url_encoded: bool) -> Option<String>;

    /// Returns the stable client identifier for this installation.
    fn client_id(&self) -> ClientId;
}

// ============================================================================
// ConnectionStore
// ============================================================================

/// Persists the connection URL for reconnection across process restarts.
pub trait ConnectionStore: Send + Sync {
    /// Returns the stored connection URL, if any.
    fn stored_connection_url(&self) -> Option<String>;

    /// Persists the connection URL; `None` clears it.
    fn save_connection_url(&self, url: Option<&str>);
}

// ============================================================================
// SessionPresenter
// ============================================================================

/// Receives presentation-level session notifications.
///
/// Rendering is entirely external; the engine only reports transitions and
/// asks one question: whether the interactive authorization UI is up (which
/// suppresses automatic reconnects).
pub trait SessionPresenter: Send + Sync {
    /// A connection attempt has started.
    fn on_connecting(&self);

    /// The handshake completed; the session is live.
    fn on_connected(&self);

    /// The session disconnected with the given reason.
    fn on_disconnected(&self, reason: &DisconnectReason);

    /// An automatic reconnect has been scheduled.
    fn on_reconnecting(&self);

    /// No token is available; interactive authorization is required.
    fn on_authorization_needed(&self, session_id: &SessionId);

    /// Returns `true` while the interactive authorization UI is active.
    fn is_authorization_ui_active(&self) -> bool;
}

// ============================================================================
// ControlDispatcher
// ============================================================================

/// Routes non-handshake control events to feature handlers.
pub trait ControlDispatcher: Send + Sync {
    /// Dispatches a control event onward.
    fn dispatch(&self, event: Event);
}

// ============================================================================
// SessionListener
// ============================================================================

/// Lifecycle observer registered with a session.
pub trait SessionListener: Send + Sync {
    /// The session connected and the handshake completed.
    fn on_session_connected(&self);

    /// The session disconnected.
    fn on_session_disconnected(&self, reason: &DisconnectReason);

    /// The session terminated; all resources were released.
    fn on_session_terminated(&self);
}

// ============================================================================
// Test Doubles
// ============================================================================

#[cfg(test)]
pub(crate) mod doubles {
    //! In-memory collaborator implementations for session tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// State provider with a fixed org/client id and scripted state events.
    pub(crate) struct FixedStateProvider {
        pub org_id: Option<String>,
        pub client_id: ClientId,
        pub state_events: Mutex<Vec<Event>>,
    }

    impl FixedStateProvider {
        pub(crate) fn new(org_id: Option<&str>) -> Self {
            Self {
                org_id: org_id.map(str::to_string),
                client_id: ClientId::new("client-7"),
                state_events: Mutex::new(Vec::new()),
            }
        }
    }

    impl StateProvider for FixedStateProvider {
        fn all_state_events(&self) -> Vec<Event> {
            self.state_events.lock().clone()
        }

        fn org_id(&self, url_encoded: bool) -> Option<String> {
            let raw = self.org_id.clone()?;
            if url_encoded {
                Some(urlencoding::encode(&raw).into_owned())
            } else {
                Some(raw)
            }
        }

        fn client_id(&self) -> ClientId {
            self.client_id.clone()
        }
    }

    /// Connection store backed by a mutex'd option.
    #[derive(Default)]
    pub(crate) struct InMemoryStore {
        pub url: Mutex<Option<String>>,
    }

    impl ConnectionStore for InMemoryStore {
        fn stored_connection_url(&self) -> Option<String> {
            self.url.lock().clone()
        }

        fn save_connection_url(&self, url: Option<&str>) {
            *self.url.lock() = url.map(str::to_string);
        }
    }

    /// Presenter that counts notifications.
    #[derive(Default)]
    pub(crate) struct CountingPresenter {
        pub connecting: AtomicUsize,
        pub connected: AtomicUsize,
        pub disconnected: AtomicUsize,
        pub reconnecting: AtomicUsize,
        pub authorization_needed: AtomicUsize,
        pub auth_ui_active: AtomicBool,
        pub last_reason: Mutex<Option<DisconnectReason>>,
    }

    impl SessionPresenter for CountingPresenter {
        fn on_connecting(&self) {
            self.connecting.fetch_add(1, Ordering::SeqCst);
        }

        fn on_connected(&self) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_disconnected(&self, reason: &DisconnectReason) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
            *self.last_reason.lock() = Some(*reason);
        }

        fn on_reconnecting(&self) {
            self.reconnecting.fetch_add(1, Ordering::SeqCst);
        }

        fn on_authorization_needed(&self, _session_id: &SessionId) {
            self.authorization_needed.fetch_add(1, Ordering::SeqCst);
        }

        fn is_authorization_ui_active(&self) -> bool {
            self.auth_ui_active.load(Ordering::SeqCst)
        }
    }

    /// Dispatcher that records control types it receives.
    #[derive(Default)]
    pub(crate) struct RecordingDispatcher {
        pub control_types: Mutex<Vec<String>>,
    }

    impl ControlDispatcher for RecordingDispatcher {
        fn dispatch(&self, event: Event) {
            self.control_types
                .lock()
                .push(event.control_type().unwrap_or_default().to_string());
        }
    }

    /// Listener that counts lifecycle callbacks.
    #[derive(Default)]
    pub(crate) struct CountingListener {
        pub connected: AtomicUsize,
        pub disconnected: AtomicUsize,
        pub terminated: AtomicUsize,
    }

    impl SessionListener for CountingListener {
        fn on_session_connected(&self) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_session_disconnected(&self, _reason: &DisconnectReason) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_session_terminated(&self) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}
