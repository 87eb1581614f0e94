//! Close-code taxonomy for session disconnects.
//!
//! The collector assigns a close code when the connection drops. Each code
//! maps to a distinct user-facing category that decides whether the session
//! terminates or schedules an automatic reconnect.
//!
//! | Code | Reason | Retry |
//! |------|--------|-------|
//! | 1000 | normal (user-initiated) | no |
//! | 4400 | client error | no |
//! | 4900 | org mismatch | no |
//! | 4901 | connection limit exceeded | no |
//! | 4902 | event limit exceeded | no |
//! | 4903 | session deleted | no |
//! | other | abnormal / unspecified | yes |

// ============================================================================
// DisconnectReason
// ============================================================================

/// Logical disconnect category mapped from a transport close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// User-initiated close. The session ends cleanly with no retry.
    Normal,

    /// The collector rejected the client (malformed handshake or events).
    ClientError,

    /// The session belongs to a different organization.
    OrgMismatch,

    /// The session already has its maximum number of connected clients.
    ConnectionLimit,

    /// The session exceeded its event quota.
    EventLimit,

    /// The session was deleted on the collector side.
    SessionDeleted,

    /// Unspecified or unexpected close; eligible for automatic reconnect.
    Abnormal(u16),
}

impl DisconnectReason {
    /// Maps a transport close code to its logical category.
    #[must_use]
    pub const fn from_close_code(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            4400 => Self::ClientError,
            4900 => Self::OrgMismatch,
            4901 => Self::ConnectionLimit,
            4902 => Self::EventLimit,
            4903 => Self::SessionDeleted,
            other => Self::Abnormal(other),
        }
    }

    /// Returns the transport close code for this category.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ClientError => 4400,
            Self::OrgMismatch => 4900,
            Self::ConnectionLimit => 4901,
            Self::EventLimit => 4902,
            Self::SessionDeleted => 4903,
            Self::Abnormal(code) => *code,
        }
    }

    /// Returns `true` if this was a clean, user-initiated close.
    #[inline]
    #[must_use]
    pub const fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Returns `true` if an automatic reconnect may be attempted.
    ///
    /// Only abnormal/unspecified closes are retryable; every enumerated
    /// collector code is terminal for the session.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Abnormal(_))
    }

    /// Returns a user-facing description for presentation logging.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Session closed",
            Self::ClientError => "Client rejected by collector",
            Self::OrgMismatch => "Session belongs to a different organization",
            Self::ConnectionLimit => "Connection limit for this session reached",
            Self::EventLimit => "Event limit for this session reached",
            Self::SessionDeleted => "Session was deleted",
            Self::Abnormal(_) => "Connection lost unexpectedly",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
