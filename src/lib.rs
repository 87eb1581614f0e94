//! Session Relay - Remote diagnostics session client library.
//!
//! This library connects a host application to a remote collector over a
//! WebSocket session and relays structured diagnostic events in both
//! directions.
//!
//! # Architecture
//!
//! The engine follows a session/worker model:
//!
//! - **Session**: owns one connection, the reconnect policy, and the
//!   authorization/handshake gates
//! - **Workers**: two single-flight queue loops, outbound (application →
//!   collector, chunked) and inbound (collector → application, control only)
//!
//! Key design principles:
//!
//! - Nothing queued flows before the collector's handshake control event
//! - Events enqueued before a connection exists are buffered, then flushed
//!   in order
//! - Oversized payloads are fragmented client-side and reassembled by the
//!   collector
//! - Close codes drive the state machine: terminal codes tear down, anything
//!   else schedules a cancellable reconnect
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::Map;
//! use session_relay::{
//!     ClientContext, Collaborators, Environment, Event, EventType, Session, SessionConfig,
//!     SessionId,
//! };
//!
//! # fn collaborators() -> Collaborators { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let ctx = Arc::new(ClientContext::new());
//!     let config = SessionConfig::new(
//!         SessionId::new("4ae99b2d-9c44-4b13-bb0a-d3a1f2b5ef63"),
//!         Environment::Prod,
//!         "relay.example.com",
//!     );
//!
//!     let session = Session::start(
//!         config,
//!         collaborators(),
//!         Arc::new(Map::new),
//!         Arc::clone(&ctx),
//!     );
//!
//!     // Events are buffered until the collector handshake completes
//!     session.enqueue(Event::new(&ctx, "com.example.app", EventType::Generic, None));
//!     session.connect("8917");
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Per-process client context and event sequencing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Event envelope, chunking, close-code taxonomy |
//! | [`session`] | Session state machine and boundary traits |
//! | [`transport`] | WebSocket connection layer (internal) |
//! | [`worker`] | Outbound/inbound event queue workers |

// ============================================================================
// Modules
// ============================================================================

/// Per-process client context.
///
/// Holds the monotonic event sequence counter shared by everything that
/// creates events.
pub mod context;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol types.
///
/// Event envelope, oversized-payload chunking, and the close-code taxonomy.
pub mod protocol;

/// Session lifecycle.
///
/// The [`Session`] state machine plus the collaborator traits the host
/// application implements.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling the connection and its signal stream.
pub mod transport;

/// Event queue workers.
///
/// The generic queue loop and its outbound/inbound specializations.
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Context
pub use context::ClientContext;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChunkId, ClientId, EventId, SessionId};

// Protocol types
pub use protocol::{DisconnectReason, Event, EventType, MAX_FRAME_BYTES, MAX_PAYLOAD_BYTES};

// Session types
pub use session::{
    Collaborators, ConnectionStore, ControlDispatcher, Environment, ListenerId, Session,
    SessionConfig, SessionListener, SessionPresenter, StateProvider,
};

// Worker types
pub use worker::{ClientInfoProvider, InboundQueueWorker, OutboundQueueWorker};
