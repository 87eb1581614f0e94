//! Payload chunking for oversized events.
//!
//! The transport enforces a hard frame-size ceiling. An event whose wire form
//! exceeds it is replaced by N smaller events sharing a generated `chunkId`,
//! each carrying `chunkTotal`, `chunkSequenceNumber` (0-indexed), and a
//! `chunkData` fragment of the serialized original payload.
//!
//! Concatenating the `chunkData` fragments in `chunkSequenceNumber` order
//! reconstructs the exact serialized payload bytes; the collector JSON-parses
//! the concatenation to reassemble the event.
//!
//! # Sizing
//!
//! The wire representation is base64-like-expanded in transit (4/3 growth),
//! a fixed headroom is reserved for metadata/framing, and the remainder is
//! halved to tolerate string-escaping growth during reassembly:
//!
//! ```text
//! max_payload = ((32 KiB * 3/4) - 2 KiB) / 2 = 11264 bytes
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::warn;

use crate::context::ClientContext;
use crate::identifiers::ChunkId;
use crate::protocol::Event;

// ============================================================================
// Constants
// ============================================================================

/// Hard transport frame-size ceiling, in bytes.
pub const MAX_FRAME_BYTES: usize = 32 * 1024;

/// Headroom reserved for chunk metadata and framing, in bytes.
const METADATA_HEADROOM_BYTES: usize = 2 * 1024;

/// Maximum raw payload bytes per fragment.
///
/// Derived so a fragment still fits the frame ceiling after 4/3 expansion,
/// metadata headroom, and escaping growth.
pub const MAX_PAYLOAD_BYTES: usize = ((MAX_FRAME_BYTES * 3 / 4) - METADATA_HEADROOM_BYTES) / 2;

/// Metadata key: shared identifier of one chunked event.
pub const METADATA_KEY_CHUNK_ID: &str = "chunkId";

/// Metadata key: total number of fragments.
pub const METADATA_KEY_CHUNK_TOTAL: &str = "chunkTotal";

/// Metadata key: 0-indexed fragment position.
pub const METADATA_KEY_CHUNK_SEQUENCE: &str = "chunkSequenceNumber";

/// Payload key: the fragment text.
pub const PAYLOAD_KEY_CHUNK_DATA: &str = "chunkData";

// ============================================================================
// Chunking
// ============================================================================

/// Splits an oversized event payload into ordered fragment events.
///
/// Pure transformation:
///
/// - Payload absent/empty, or serialized payload within `max_fragment_bytes`:
///   returns the original event unchanged (singleton result).
/// - Otherwise: one fragment event per `chunkData` slice, in ascending
///   `chunkSequenceNumber` order, all sharing one fresh chunk id. Fragments
///   inherit `vendor`/`type`/`timestamp` from the source.
/// - Serialization failure: returns an empty result and the event is dropped
///   whole. Partial chunk delivery is disallowed.
///
/// Fragments are split at UTF-8 character boundaries, at most
/// `max_fragment_bytes` bytes each, so every `chunkData` is valid text while
/// the byte concatenation is exactly the serialized payload.
#[must_use]
pub fn chunk_event(ctx: &ClientContext, event: &Event, max_fragment_bytes: usize) -> Vec<Event> {
    let Some(payload) = event.payload.as_ref().filter(|p| !p.is_empty()) else {
        return vec![event.clone()];
    };

    let serialized = match serde_json::to_string(payload) {
        Ok(s) => s,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Payload serialization failed; dropping event");
            return Vec::new();
        }
    };

    if serialized.len() <= max_fragment_bytes {
        return vec![event.clone()];
    }

    let fragments = split_at_char_boundaries(&serialized, max_fragment_bytes);
    let chunk_id = ChunkId::generate();
    let chunk_total = fragments.len();

    fragments
        .into_iter()
        .enumerate()
        .map(|(index, fragment)| {
            let mut metadata = Map::new();
            metadata.insert(
                METADATA_KEY_CHUNK_ID.to_string(),
                Value::String(chunk_id.to_string()),
            );
            metadata.insert(METADATA_KEY_CHUNK_TOTAL.to_string(), chunk_total.into());
            metadata.insert(METADATA_KEY_CHUNK_SEQUENCE.to_string(), index.into());

            let mut payload = Map::new();
            payload.insert(
                PAYLOAD_KEY_CHUNK_DATA.to_string(),
                Value::String(fragment.to_string()),
            );

            Event::derived_from(ctx, event, metadata, payload)
        })
        .collect()
}

/// Splits `text` into slices of at most `max_bytes` bytes, each ending on a
/// character boundary.
fn split_at_char_boundaries(text: &str, max_bytes: usize) -> Vec<&str> {
    debug_assert!(max_bytes >= 4, "fragment size must fit any UTF-8 scalar");

    let mut fragments = Vec::with_capacity(text.len().div_ceil(max_bytes));
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            fragments.push(rest);
            break;
        }

        let mut end = max_bytes;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }

        let (fragment, tail) = rest.split_at(end);
        fragments.push(fragment);
        rest = tail;
    }

    fragments
}

// ============================================================================
// Tests
// ============================================================================
