//! Session events and connection actions.

use std::time::Duration;

use chatwire_proto::InboundEvent;

/// Events published to subscribers (the presentation layer).
///
/// Lifecycle notifications (`Opened`, `Closed`) are distinct from decoded
/// protocol events so UIs can flip affordances without inspecting frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport handshake succeeded; `send` is now permitted.
    Opened,

    /// The transport ended (locally, remotely, or due to error).
    Closed {
        /// Closure code reported by the transport.
        code: u16,
        /// Whether the closure used the normal-closure code.
        was_clean: bool,
    },

    /// One decoded inbound frame, in delivery order.
    Inbound(InboundEvent),

    /// A frame with an unrecognized discriminant was ignored.
    ///
    /// Forward-compatibility diagnostic; never affects connection state.
    DecodeWarning {
        /// The raw segment text.
        raw: String,
    },
}

/// Actions the connection state machine produces for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport to this target.
    OpenTransport {
        /// Fully-built transport URL, identity already embedded.
        url: String,
    },

    /// Write this frame to the live transport.
    SendFrame(String),

    /// Close the live transport with this code.
    CloseTransport {
        /// Closure code to send (1000 for intentional disconnect).
        code: u16,
    },

    /// Arm the reconnect timer; feed `reconnect_due` back when it fires.
    ScheduleReconnect {
        /// Fixed delay before the attempt.
        delay: Duration,
    },

    /// Deliver this event to subscribers.
    Publish(SessionEvent),
}
