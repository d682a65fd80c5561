//! Connection lifecycle state machine.
//!
//! Manages transport establishment, automatic reconnection, and event
//! republication. Uses the action pattern: methods mutate state and return
//! actions for the driver to execute. This keeps the state machine pure (no
//! I/O) and makes the retry guard independently testable.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ connect ┌────────────┐  open   ┌──────┐
//! │ Idle │────────>│ Connecting │────────>│ Open │
//! └──────┘         └────────────┘         └──────┘
//!                        │ ^                  │
//!           close/error  │ │ retry timer      │ close/error/
//!                        ↓ │   (unclean)      ↓ failed write
//!                     ┌────────┐          ┌────────┐
//!                     │ Closed │<─────────│ Closed │
//!                     └────────┘          └────────┘
//! ```
//!
//! Transitions are monotonic along the cycle; no transition skips a state.
//! At most one transport handle is live per `Connection` at any time, and at
//! most one reconnect attempt is scheduled while `Closed`.

use std::time::Duration;

use chatwire_proto::{DecodeError, OutboundAction, decode, encode};
use chrono::{DateTime, Utc};

use crate::{
    endpoint::Endpoint,
    error::ClientError,
    event::{ConnectionAction, SessionEvent},
};

/// The "normal closure" transport code; anything else triggers the retry
/// policy.
pub const NORMAL_CLOSURE_CODE: u16 = 1000;

/// Closure code used when the transport errored without reporting one.
pub const ABNORMAL_CLOSURE_CODE: u16 = 1006;

/// Fixed delay before a reconnection attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fixed delay between an unclean closure and the reconnect attempt.
    pub retry_delay: Duration,
    /// Maximum number of reconnect attempts per connection. `None` retries
    /// indefinitely, matching the reference behavior.
    pub max_retries: Option<u32>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { retry_delay: DEFAULT_RETRY_DELAY, max_retries: None }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport exists yet. Entered only before the first `connect`.
    Idle,
    /// Transport created, handshake in flight.
    Connecting,
    /// Handshake succeeded; sends are permitted.
    Open,
    /// Transport ended, locally or remotely.
    Closed,
}

/// A participant's identity label.
///
/// Opaque, caller-supplied, non-empty. Immutable once a connection attempt
/// starts; changing identity requires a new `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from a raw label, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidIdentity` if the label trims to nothing
    pub fn new(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidIdentity);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The identity label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Connection lifecycle state machine.
///
/// Exclusively owns the (abstract) transport handle: drivers open, write,
/// and close transports only as instructed by the returned
/// [`ConnectionAction`]s, and subscribers receive only derived
/// [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    endpoint: Endpoint,
    config: ConnectionConfig,
    identity: Option<Identity>,
    /// A reconnect attempt is scheduled and has not yet fired.
    reconnect_pending: bool,
    /// The caller disconnected intentionally; suppress retries until the
    /// next `connect`.
    user_closed: bool,
    retries_used: u32,
}

impl Connection {
    /// Create a new connection manager in [`ConnectionState::Idle`].
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Idle,
            endpoint,
            config,
            identity: None,
            reconnect_pending: false,
            user_closed: false,
            retries_used: 0,
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether sends are currently permitted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Whether a reconnect attempt is scheduled and has not yet fired.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Identity of the current or most recent connection attempt.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Begin a connection attempt as `identity`.
    ///
    /// A no-op while `Connecting` or `Open`: calling `connect` again is not
    /// a cancellation, it just prevents duplicate concurrent connections.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidIdentity` if `identity` is empty after trimming
    pub fn connect(&mut self, identity: &str) -> Result<Vec<ConnectionAction>, ClientError> {
        let identity = Identity::new(identity)?;

        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::debug!(state = ?self.state, "connect ignored, connection already live");
                Ok(Vec::new())
            },
            ConnectionState::Idle | ConnectionState::Closed => {
                let url = self.endpoint.url_for(&identity);
                self.identity = Some(identity);
                self.user_closed = false;
                self.retries_used = 0;
                self.state = ConnectionState::Connecting;

                Ok(vec![ConnectionAction::OpenTransport { url }])
            },
        }
    }

    /// Transport handshake succeeded.
    ///
    /// Ignored unless `Connecting`; a stale notification after the transport
    /// was already torn down must not resurrect the connection.
    pub fn handle_open(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = ?self.state, "open notification ignored");
            return Vec::new();
        }

        self.state = ConnectionState::Open;
        self.reconnect_pending = false;
        self.retries_used = 0;

        vec![ConnectionAction::Publish(SessionEvent::Opened)]
    }

    /// Transport delivered a payload.
    ///
    /// Decodes and republishes each frame in delivery order. Malformed
    /// segments are logged and dropped; unrecognized frame types surface as
    /// [`SessionEvent::DecodeWarning`]. Neither is fatal to the connection
    /// or to the other frames in the payload.
    pub fn handle_data(&mut self, raw_payload: &str) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        for result in decode(raw_payload) {
            match result {
                Ok(event) => actions.push(ConnectionAction::Publish(SessionEvent::Inbound(event))),
                Err(DecodeError::UnknownKind { raw }) => {
                    tracing::debug!(%raw, "ignoring frame with unrecognized type");
                    actions.push(ConnectionAction::Publish(SessionEvent::DecodeWarning { raw }));
                },
                Err(err @ DecodeError::Malformed { .. }) => {
                    tracing::warn!(%err, "dropping malformed frame");
                },
            }
        }

        actions
    }

    /// Transport closed with `code`.
    ///
    /// Idempotent once `Closed`: the transport contract allows an error
    /// notification and a closure notification for the same failure.
    pub fn handle_close(&mut self, code: u16) -> Vec<ConnectionAction> {
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            return Vec::new();
        }

        self.state = ConnectionState::Closed;
        let was_clean = code == NORMAL_CLOSURE_CODE;

        let mut actions =
            vec![ConnectionAction::Publish(SessionEvent::Closed { code, was_clean })];

        if !was_clean {
            actions.extend(self.schedule_reconnect());
        }

        actions
    }

    /// Transport reported an error without a closure code.
    ///
    /// Treated as an unclean closure; the eventual closure notification that
    /// follows is absorbed by `handle_close`'s idempotency.
    pub fn handle_error(&mut self) -> Vec<ConnectionAction> {
        self.handle_close(ABNORMAL_CLOSURE_CODE)
    }

    /// A write to the transport failed.
    ///
    /// A failed write is presumed to mean the connection is broken even if
    /// no closure notification has arrived yet.
    pub fn write_failed(&mut self) -> Vec<ConnectionAction> {
        tracing::warn!("transport write failed, forcing closure");
        self.handle_error()
    }

    /// The scheduled reconnect delay elapsed.
    ///
    /// No-op if the pending attempt was superseded: the user disconnected,
    /// or the connection has since left `Closed` (a fresh `connect` call or
    /// a completed reconnect).
    pub fn reconnect_due(&mut self) -> Vec<ConnectionAction> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;

        if self.user_closed || self.state != ConnectionState::Closed {
            tracing::debug!(state = ?self.state, "scheduled reconnect superseded");
            return Vec::new();
        }

        let Some(identity) = self.identity.clone() else {
            // Cannot be pending without a prior connect; treat as superseded.
            return Vec::new();
        };

        tracing::debug!(identity = identity.as_str(), "attempting reconnect");
        self.state = ConnectionState::Connecting;

        vec![ConnectionAction::OpenTransport { url: self.endpoint.url_for(&identity) }]
    }

    /// Encode and send one outbound action.
    ///
    /// `now` becomes the frame timestamp; callers pass wall-clock time so
    /// the machine stays pure.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotConnected` if the state is not `Open`
    /// - `ClientError::Encode` if the content is empty after trimming or the
    ///   frame exceeds the wire size limit
    pub fn send(
        &mut self,
        action: &OutboundAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionAction>, ClientError> {
        if self.state != ConnectionState::Open {
            return Err(ClientError::NotConnected { state: self.state });
        }

        let Some(identity) = self.identity.as_ref() else {
            // Open without an identity is unreachable; report as not
            // connected rather than panic.
            return Err(ClientError::NotConnected { state: self.state });
        };

        let frame = encode(action, identity.as_str(), now)?;

        Ok(vec![ConnectionAction::SendFrame(frame)])
    }

    /// Terminate the connection intentionally.
    ///
    /// Closes the transport with the normal-closure code and suppresses any
    /// pending scheduled reconnect. This is the only way to cancel a live
    /// connection.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.user_closed = true;
        self.reconnect_pending = false;

        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                vec![ConnectionAction::CloseTransport { code: NORMAL_CLOSURE_CODE }]
            },
            ConnectionState::Idle | ConnectionState::Closed => Vec::new(),
        }
    }

    /// Arm the retry policy if nothing suppresses it.
    ///
    /// Exactly one attempt may be pending at a time; intentional disconnects
    /// and an exhausted retry budget suppress scheduling entirely.
    fn schedule_reconnect(&mut self) -> Vec<ConnectionAction> {
        if self.user_closed || self.reconnect_pending {
            return Vec::new();
        }

        if let Some(max) = self.config.max_retries {
            if self.retries_used >= max {
                tracing::warn!(max, "retry budget exhausted, staying closed");
                return Vec::new();
            }
        }

        self.retries_used += 1;
        self.reconnect_pending = true;

        vec![ConnectionAction::ScheduleReconnect { delay: self.config.retry_delay }]
    }
}
