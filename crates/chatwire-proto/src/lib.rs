//! Chatwire protocol
//!
//! Wire types and codec for the Chatwire text chat protocol. A frame is one
//! self-contained JSON record; frames are newline-delimited on the wire, and
//! a single transport delivery may carry zero, one, or many complete frames.
//!
//! # Components
//!
//! - [`InboundEvent`] / [`OutboundAction`]: the typed model on either side of
//!   the wire
//! - [`decode`] / [`encode`]: pure, stateless translation between wire text
//!   and the typed model
//! - [`PresenceCounter`]: the counting contract subscribers apply to presence
//!   events
//!
//! The codec is deliberately permissive on input: a frame with an
//! unrecognized `type` is reported as a diagnostic rather than an error, and
//! one malformed segment never prevents decoding of its neighbors.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod errors;
mod message;

pub use codec::{MAX_FRAME_BYTES, decode, encode};
pub use errors::{DecodeError, EncodeError};
pub use message::{InboundEvent, OutboundAction, PresenceCounter};
