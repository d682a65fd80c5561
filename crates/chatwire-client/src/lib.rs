//! Chatwire client
//!
//! Action-based connection manager for the Chatwire protocol. Owns the
//! connection lifecycle: establishment, automatic reconnection after
//! transient loss, and translation between transport payloads and typed
//! events.
//!
//! # Architecture
//!
//! [`Connection`] is a Sans-IO state machine. Caller calls
//! ([`Connection::connect`], [`Connection::send`],
//! [`Connection::disconnect`]) and transport notifications
//! ([`Connection::handle_open`], [`Connection::handle_data`],
//! [`Connection::handle_close`], [`Connection::handle_error`]) mutate state
//! and return [`ConnectionAction`]s for a driver to execute. Subscribers see
//! only the derived [`SessionEvent`] stream, never the transport handle.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ChatHandle`]: async handle backed by a WebSocket driver
//! - [`transport::spawn`]: start the driver task

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod endpoint;
mod error;
mod event;

#[cfg(feature = "transport")]
pub mod transport;

pub use chatwire_proto::{InboundEvent, OutboundAction, PresenceCounter};
pub use connection::{
    ABNORMAL_CLOSURE_CODE, Connection, ConnectionConfig, ConnectionState, DEFAULT_RETRY_DELAY,
    Identity, NORMAL_CLOSURE_CODE,
};
pub use endpoint::Endpoint;
pub use error::ClientError;
pub use event::{ConnectionAction, SessionEvent};
