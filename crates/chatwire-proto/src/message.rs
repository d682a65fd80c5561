//! Typed model for inbound events and outbound actions.
//!
//! These are the shapes the rest of the system works with; the wire format
//! lives in [`crate::codec`]. Events are produced by decoding a single wire
//! frame and consumed by subscribers; the core never persists them.

use chrono::{DateTime, Utc};

/// A single decoded inbound frame.
///
/// The `chat` wire frame always carries a timestamp; presence frames carry
/// one when the server supplies it, so it is optional there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A chat message from a participant.
    ChatMessage {
        /// Sender's identity label.
        identity: String,
        /// Message body.
        content: String,
        /// Server-assigned send time.
        occurred_at: DateTime<Utc>,
    },

    /// A participant joined.
    PresenceJoin {
        /// Identity of the participant who joined.
        identity: String,
        /// Display text (e.g. "bob joined the chat").
        content: String,
        /// Server-assigned time, when present.
        occurred_at: Option<DateTime<Utc>>,
    },

    /// A participant left.
    PresenceLeave {
        /// Identity of the participant who left.
        identity: String,
        /// Display text (e.g. "bob left the chat").
        content: String,
        /// Server-assigned time, when present.
        occurred_at: Option<DateTime<Utc>>,
    },

    /// Server-reported application-level error.
    ///
    /// Display-worthy, never fatal to the connection.
    ProtocolError {
        /// Error text from the server.
        content: String,
    },
}

/// User intent to be encoded into a wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Send a chat message.
    ChatSend {
        /// Message body. Trimmed before encoding; must be non-empty after
        /// trimming.
        content: String,
    },
}

/// Participant count derived from presence events.
///
/// The core has no authoritative count; it only relays events. This type is
/// the contract subscribers rely on: increment on [`InboundEvent::PresenceJoin`],
/// decrement on [`InboundEvent::PresenceLeave`], floor at zero. Other events
/// leave the count unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCounter(u32);

impl PresenceCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current participant count.
    pub fn count(&self) -> u32 {
        self.0
    }

    /// Apply one inbound event to the count.
    pub fn observe(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::PresenceJoin { .. } => self.0 += 1,
            InboundEvent::PresenceLeave { .. } => self.0 = self.0.saturating_sub(1),
            InboundEvent::ChatMessage { .. } | InboundEvent::ProtocolError { .. } => {},
        }
    }
}
