//! Event queue workers.
//!
//! Two directional queues sit between the session and the connection, each a
//! single-flight loop over an unbounded FIFO queue:
//!
//! ```text
//! application ──► OutboundQueueWorker ──► Connection ──► collector
//! application ◄── InboundQueueWorker  ◄── Connection ◄── collector
//! ```
//!
//! The generic loop lives in [`queue`]; the two directions are plain
//! composition over an injected [`EventProcessor`](queue::EventProcessor),
//! not an inheritance hierarchy.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `queue` | Generic queue-backed worker loop |
//! | `outbound` | Application → collector, handshake gate, chunking |
//! | `inbound` | Collector → application, control-only filter |

// ============================================================================
// Submodules
// ============================================================================

/// Generic queue-backed worker loop.
pub mod queue;

/// Outbound event queue worker.
pub mod outbound;

/// Inbound event queue worker.
pub mod inbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{ControlEventListener, InboundQueueWorker};
pub use outbound::{ClientInfoProvider, OutboundQueueWorker};
pub use queue::{EventProcessor, EventQueueWorker};
