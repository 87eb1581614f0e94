//! Session lifecycle.
//!
//! A session is the top-level unit of work: one collector connection, the
//! queue workers feeding it, and the policy around authorization, handshake
//! gating, and reconnection. Everything the session cannot decide on its own
//! (presentation, persistence, host state, control routing) is injected
//! through the trait seams in [`collaborators`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | The [`Session`] state machine |
//! | `collaborators` | Boundary traits the host application implements |
//! | `url` | Connection URL template, persistence format, tiers |

// ============================================================================
// Submodules
// ============================================================================

/// Session state machine.
pub mod core;

/// Boundary traits.
pub mod collaborators;

/// Connection URL construction and parsing.
pub mod url;

// ============================================================================
// Re-exports
// ============================================================================

pub use collaborators::{
    ConnectionStore, ControlDispatcher, SessionListener, SessionPresenter, StateProvider,
};
pub use self::core::{Collaborators, ListenerId, RECONNECT_DELAY, Session, SessionConfig};
pub use url::{Environment, StoredSession, build_connection_url, parse_connection_url};
