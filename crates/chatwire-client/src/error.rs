//! Client error types.
//!
//! Everything here is surfaced to the caller synchronously; nothing the
//! client detects is fatal to the process. Transport-level breakage is
//! reported as [`ClientError::Transport`] and also drives the state machine
//! to `Closed` plus a scheduled retry.

use chatwire_proto::EncodeError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors surfaced to callers of the connection manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Identity was empty after trimming surrounding whitespace.
    #[error("identity is empty after trimming")]
    InvalidIdentity,

    /// A send was attempted while the connection was not open.
    #[error("cannot send while connection is {state:?}")]
    NotConnected {
        /// State at the time of the attempt.
        state: ConnectionState,
    },

    /// The outbound action could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The underlying transport failed to open or write.
    #[error("transport error: {0}")]
    Transport(String),
}
