//! Event envelope types.
//!
//! An [`Event`] is the immutable unit of exchange with the remote collector:
//! diagnostic data flows out, control commands flow back in, both wrapped in
//! the same envelope.
//!
//! # Wire Format
//!
//! One event per transport frame, UTF-8 JSON text:
//!
//! ```json
//! {
//!   "eventID": "uuid",
//!   "vendor": "com.example.app",
//!   "type": "generic",
//!   "timestamp": 1724601600000,
//!   "eventNumber": 17,
//!   "metadata": { ... },
//!   "payload": { ... }
//! }
//! ```
//!
//! Absent `metadata`/`payload` are omitted, not null-valued. A missing
//! `eventNumber` on parse is replaced with a freshly minted local sequence
//! number (inbound compatibility).

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ClientContext;
use crate::error::Result;
use crate::identifiers::EventId;

// ============================================================================
// Constants
// ============================================================================

/// Vendor string for events minted by this engine (client-info, chunks).
pub const VENDOR_SDK: &str = "com.relay.mobile";

/// Reserved control type signalling handshake completion.
///
/// Receipt of this control event means the collector is ready to receive
/// queued traffic; the session unblocks the outbound worker on it.
pub const CONTROL_TYPE_START_FORWARDING: &str = "startEventForwarding";

/// Payload key holding the control type of a control event.
pub const PAYLOAD_KEY_TYPE: &str = "type";

/// Payload key holding the optional control detail map.
pub const PAYLOAD_KEY_DETAIL: &str = "detail";

// ============================================================================
// EventType
// ============================================================================

/// Fixed set of event types understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Generic diagnostic event.
    #[serde(rename = "generic")]
    Generic,

    /// Log line forwarded from the host application.
    #[serde(rename = "log")]
    Log,

    /// Control command (collector → client, or acks back).
    #[serde(rename = "control")]
    Control,

    /// Client/device metadata sent at connection time.
    #[serde(rename = "clientInfo")]
    ClientInfo,

    /// Opaque binary-blob reference.
    #[serde(rename = "blob")]
    Blob,
}

impl EventType {
    /// Returns the wire string for this type.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Log => "log",
            Self::Control => "control",
            Self::ClientInfo => "clientInfo",
            Self::Blob => "blob",
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// Immutable envelope carrying a typed diagnostic or control payload.
///
/// Events are created by application/plugin code or by wire deserialization
/// and never mutated afterward. The sequence number is assigned exactly once
/// at construction.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Globally unique identifier.
    #[serde(rename = "eventID")]
    pub id: EventId,

    /// Namespacing vendor string.
    pub vendor: String,

    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Milliseconds since epoch at creation.
    pub timestamp: i64,

    /// Monotonic per-process sequence number. Not unique across processes.
    #[serde(rename = "eventNumber")]
    pub sequence_number: u32,

    /// Optional bookkeeping map (chunk metadata, shared-state annotations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Optional payload map; absent for some control acks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

// ============================================================================
// Event - Constructors
// ============================================================================

impl Event {
    /// Creates a new event with a fresh id, timestamp, and sequence number.
    #[must_use]
    pub fn new(
        ctx: &ClientContext,
        vendor: impl Into<String>,
        event_type: EventType,
        payload: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            vendor: vendor.into(),
            event_type,
            timestamp: now_ms(),
            sequence_number: ctx.next_sequence_number(),
            metadata: None,
            payload,
        }
    }

    /// Creates a new event carrying both metadata and payload.
    #[must_use]
    pub fn with_metadata(
        ctx: &ClientContext,
        vendor: impl Into<String>,
        event_type: EventType,
        metadata: Option<Map<String, Value>>,
        payload: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            metadata,
            ..Self::new(ctx, vendor, event_type, payload)
        }
    }

    /// Creates a client-info event carrying a caller-supplied device payload.
    ///
    /// Sent by the outbound worker directly on worker start, bypassing the
    /// queue.
    #[must_use]
    pub fn client_info(ctx: &ClientContext, payload: Map<String, Value>) -> Self {
        Self::new(ctx, VENDOR_SDK, EventType::ClientInfo, Some(payload))
    }

    /// Creates a sibling event reusing `vendor`/`type`/`timestamp` from a
    /// source event with fresh identity and the given maps.
    ///
    /// Used by the chunker: fragments inherit provenance but are distinct
    /// events on the wire.
    #[must_use]
    pub(crate) fn derived_from(
        ctx: &ClientContext,
        source: &Event,
        metadata: Map<String, Value>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            vendor: source.vendor.clone(),
            event_type: source.event_type,
            timestamp: source.timestamp,
            sequence_number: ctx.next_sequence_number(),
            metadata: Some(metadata),
            payload: Some(payload),
        }
    }
}

// ============================================================================
// Event - Wire Conversion
// ============================================================================

/// Serde mirror for inbound parsing.
///
/// `eventNumber` and `timestamp` are optional on the wire; defaults need the
/// client context, so [`Event`] does not implement `Deserialize` directly.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "eventID")]
    id: EventId,
    vendor: String,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(rename = "eventNumber", default)]
    sequence_number: Option<u32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl Event {
    /// Serializes this event to its wire JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_wire_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses an event from inbound wire text.
    ///
    /// A missing `eventNumber` is replaced with a freshly minted local
    /// sequence number; a missing `timestamp` defaults to now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) on malformed JSON or an
    /// unknown event type.
    pub fn from_wire_json(text: &str, ctx: &ClientContext) -> Result<Self> {
        let wire: WireEvent = serde_json::from_str(text)?;

        Ok(Self {
            id: wire.id,
            vendor: wire.vendor,
            event_type: wire.event_type,
            timestamp: wire.timestamp.unwrap_or_else(now_ms),
            sequence_number: wire
                .sequence_number
                .unwrap_or_else(|| ctx.next_sequence_number()),
            metadata: wire.metadata,
            payload: wire.payload,
        })
    }
}

// ============================================================================
// Event - Control Accessors
// ============================================================================

impl Event {
    /// Returns `true` if this is a control event.
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.event_type == EventType::Control
    }

    /// Returns the control type from the payload, if this is a control event.
    #[must_use]
    pub fn control_type(&self) -> Option<&str> {
        if !self.is_control() {
            return None;
        }
        self.payload
            .as_ref()
            .and_then(|p| p.get(PAYLOAD_KEY_TYPE))
            .and_then(|v| v.as_str())
    }

    /// Returns the optional control detail map.
    #[must_use]
    pub fn control_detail(&self) -> Option<&Map<String, Value>> {
        if !self.is_control() {
            return None;
        }
        self.payload
            .as_ref()
            .and_then(|p| p.get(PAYLOAD_KEY_DETAIL))
            .and_then(|v| v.as_object())
    }

    /// Returns `true` if this is the handshake-completion control event.
    #[inline]
    #[must_use]
    pub fn is_handshake_control(&self) -> bool {
        self.control_type() == Some(CONTROL_TYPE_START_FORWARDING)
    }

    /// Returns `true` if the payload is present and non-empty.
    #[inline]
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Current time in milliseconds since the Unix epoch.
#[inline]
#[must_use]
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
