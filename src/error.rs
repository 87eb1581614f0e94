//! Error types for the session-relay client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use session_relay::{Result, Error};
//!
//! fn forward(connection: &Connection, event: &Event) -> Result<()> {
//!     connection.send(event.to_wire_json()?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::OversizedEvent`], [`Error::ChunkingFailed`] |
//! | Authorization | [`Error::OrgIdUnavailable`], [`Error::AuthorizationPending`] |
//! | Lifecycle | [`Error::SessionTerminated`], [`Error::WorkerStopped`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! No error in this engine is fatal to the host process: every failure path
//! degrades to "session not connected" rather than propagating a panic.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection to the collector cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout while dialing the collector.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed wire message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Event exceeds the transport frame ceiling and carries no payload.
    ///
    /// Metadata is non-chunkable, so an event this large cannot be split
    /// and is dropped.
    #[error("Oversized event with no chunkable payload: {size} bytes")]
    OversizedEvent {
        /// Serialized size in bytes.
        size: usize,
    },

    /// Payload chunking failed; the entire chunk set was dropped.
    ///
    /// Partial chunk delivery is disallowed, so no fragment was sent.
    #[error("Chunking failed: {message}")]
    ChunkingFailed {
        /// Description of the chunking failure.
        message: String,
    },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    /// No organization identifier could be resolved.
    ///
    /// Neither the shared configuration state nor a stored reconnection URL
    /// yielded an org id; the connect attempt is abandoned.
    #[error("Organization identifier unavailable")]
    OrgIdUnavailable,

    /// No token available; interactive authorization is required.
    #[error("Authorization pending: no session token available")]
    AuthorizationPending,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation attempted on a terminated session.
    #[error("Session terminated")]
    SessionTerminated,

    /// Event offered to a worker that is not active.
    #[error("Worker stopped; event dropped")]
    WorkerStopped,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an oversized-event error.
    #[inline]
    pub fn oversized_event(size: usize) -> Self {
        Self::OversizedEvent { size }
    }

    /// Creates a chunking error.
    #[inline]
    pub fn chunking_failed(message: impl Into<String>) -> Self {
        Self::ChunkingFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error may succeed on retry.
    ///
    /// Authorization errors need user action first; protocol and oversize
    /// errors are per-event and never retried.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionTimeout { .. } | Self::ConnectionClosed
        )
    }

    /// Returns `true` if this error requires interactive authorization.
    #[inline]
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::OrgIdUnavailable | Self::AuthorizationPending)
    }
}

// ============================================================================
// Tests
// ============================================================================
