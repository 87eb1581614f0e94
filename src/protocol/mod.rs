//! Wire protocol types.
//!
//! This module defines the event envelope exchanged with the remote
//! collector, the chunking transformation for oversized payloads, and the
//! close-code taxonomy that drives the session state machine.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`Event`] (diagnostic) | Client → Collector | Structured diagnostics |
//! | [`Event`] (control) | Collector → Client | Commands back to the client |
//! | Chunk events | Client → Collector | Fragments of one oversized event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event envelope and wire (de)serialization |
//! | `chunker` | Oversized-payload fragmentation |
//! | `close_code` | Disconnect reason taxonomy |

// ============================================================================
// Submodules
// ============================================================================

/// Event envelope types.
pub mod event;

/// Payload chunking for oversized events.
pub mod chunker;

/// Close-code taxonomy for session disconnects.
pub mod close_code;

// ============================================================================
// Re-exports
// ============================================================================

pub use chunker::{MAX_FRAME_BYTES, MAX_PAYLOAD_BYTES, chunk_event};
pub use close_code::DisconnectReason;
pub use event::{CONTROL_TYPE_START_FORWARDING, Event, EventType, VENDOR_SDK};
