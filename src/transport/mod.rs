//! WebSocket transport layer.
//!
//! This module handles the duplex channel between the client and the remote
//! collector.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Session (Rust)  │          WebSocket           │    Collector    │
//! │                  │◄────────────────────────────►│                 │
//! │  Connection      │   wss://connect.{host}/...   │  /client/v1     │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - Dial the collector URL
//! 2. [`SocketSignal::Opened`] - Channel up, workers may start
//! 3. [`SocketSignal::Message`] - Inbound frames stream to the session
//! 4. [`SocketSignal::Closed`] - Close code drives the reconnect machine

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, SocketSignal, SocketState};
