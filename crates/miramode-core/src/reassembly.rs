//! Inbound notification reassembly.
//!
//! The controller splits long payloads across several notifications. Only
//! the first fragment carries a header:
//!
//! ```text
//! byte 0   client slot + 0x40
//! byte 1   (unused)
//! byte 2   payload length
//! byte 3.. first payload bytes
//! ```
//!
//! Continuation fragments are raw payload bytes. Only one payload can be
//! in flight at a time.

use tracing::{debug, warn};

/// Offset added to the client slot in a fragment header.
pub const SLOT_MARKER: u8 = 0x40;

/// Size of the header on the first fragment of a payload.
pub const HEADER_LEN: usize = 3;

/// A complete payload and the slot it was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPayload {
    /// Client slot from the first fragment's header.
    pub client_slot: u8,
    /// Payload bytes, header stripped.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    client_slot: u8,
    expected_len: usize,
}

/// Glues notification fragments back into payloads.
///
/// Not synchronized: feed it from a single consumer.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
    pending: Option<Pending>,
}

impl Reassembler {
    /// Create an idle reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no partial payload is buffered.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Drop any partial payload and return to idle.
    pub fn reset(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(
                "Discarding partial payload ({}/{} bytes)",
                self.buffer.len(),
                pending.expected_len
            );
        }
        self.buffer.clear();
    }

    /// Feed one fragment, returning a payload when one completes.
    ///
    /// Malformed input is logged and dropped; it never produces an error.
    pub fn push(&mut self, fragment: &[u8]) -> Option<InboundPayload> {
        let pending = match self.pending {
            Some(pending) => {
                self.buffer.extend_from_slice(fragment);
                pending
            }
            None => {
                if fragment.len() < HEADER_LEN {
                    warn!(
                        "Fragment too short for header, skipping: {} bytes",
                        fragment.len()
                    );
                    return None;
                }
                self.buffer.clear();
                self.buffer.extend_from_slice(&fragment[HEADER_LEN..]);
                Pending {
                    client_slot: fragment[0].wrapping_sub(SLOT_MARKER),
                    expected_len: usize::from(fragment[2]),
                }
            }
        };

        let received = self.buffer.len();
        if received < pending.expected_len {
            self.pending = Some(pending);
            return None;
        }

        self.pending = None;
        if received > pending.expected_len {
            warn!(
                "Inconsistent payload length, skipping: expected {}, got {}",
                pending.expected_len, received
            );
            self.buffer.clear();
            return None;
        }

        let data = std::mem::take(&mut self.buffer);
        debug!(
            "Payload for slot {} ({} bytes): {:02x?}",
            pending.client_slot,
            data.len(),
            data
        );
        Some(InboundPayload {
            client_slot: pending.client_slot,
            data,
        })
    }
}
