//! Process-wide client context.
//!
//! Owns the monotonic event sequence counter. Every component that mints
//! events receives an `Arc<ClientContext>` at construction instead of
//! reaching for a hidden global.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// ClientContext
// ============================================================================

/// Shared per-process context for event construction.
///
/// The sequence counter is monotonic within this process only; it is not
/// unique across processes. A sequence number is assigned exactly once, at
/// event construction, and never reassigned.
#[derive(Debug, Default)]
pub struct ClientContext {
    /// Monotonic per-process event sequence counter.
    sequence: AtomicU32,
}

impl ClientContext {
    /// Creates a new context with the sequence counter at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next event sequence number.
    ///
    /// Safe to call from any thread; each call returns a distinct value
    /// until the counter wraps.
    #[inline]
    pub fn next_sequence_number(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Returns the current counter value without advancing it.
    #[inline]
    #[must_use]
    pub fn current_sequence_number(&self) -> u32 {
        self.sequence.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
