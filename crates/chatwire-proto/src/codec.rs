//! Newline-delimited JSON wire codec.
//!
//! One frame is one JSON record on one line. Transport delivery is not
//! guaranteed to align with message boundaries: a single delivery can carry
//! zero, one, or many complete frames, so [`decode`] always works over a
//! whole payload and reports per-segment results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{DecodeError, EncodeError},
    message::{InboundEvent, OutboundAction},
};

/// Maximum size of one encoded frame in bytes.
///
/// Matches the server's per-frame read limit; oversized frames cause the
/// server to drop the connection, so the codec rejects them up front.
pub const MAX_FRAME_BYTES: usize = 512;

/// Wire discriminant for a frame.
///
/// `Unknown` absorbs discriminants added by future servers; the codec
/// reports them as diagnostics instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FrameKind {
    Chat,
    Join,
    Leave,
    Error,
    #[serde(other)]
    Unknown,
}

/// One frame as it appears on the wire.
///
/// `username` is present for `chat`/`join`/`leave`; `timestamp` is
/// guaranteed for `chat` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRecord {
    #[serde(rename = "type")]
    kind: FrameKind,
    #[serde(default)]
    content: String,
    #[serde(default)]
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

/// Decode a transport payload into per-frame results.
///
/// Splits on the newline delimiter and decodes each non-blank segment
/// independently, preserving delivery order. One malformed segment never
/// prevents decoding of the others in the same payload.
pub fn decode(raw_payload: &str) -> Vec<Result<InboundEvent, DecodeError>> {
    raw_payload
        .split('\n')
        .filter(|segment| !segment.trim().is_empty())
        .map(decode_segment)
        .collect()
}

fn decode_segment(segment: &str) -> Result<InboundEvent, DecodeError> {
    let record: WireRecord = serde_json::from_str(segment).map_err(|e| {
        DecodeError::Malformed { raw: segment.to_owned(), reason: e.to_string() }
    })?;

    match record.kind {
        FrameKind::Chat => {
            let occurred_at = record.timestamp.ok_or_else(|| DecodeError::Malformed {
                raw: segment.to_owned(),
                reason: "chat frame is missing its timestamp".to_owned(),
            })?;

            Ok(InboundEvent::ChatMessage {
                identity: record.username,
                content: record.content,
                occurred_at,
            })
        },
        FrameKind::Join => Ok(InboundEvent::PresenceJoin {
            identity: record.username,
            content: record.content,
            occurred_at: record.timestamp,
        }),
        FrameKind::Leave => Ok(InboundEvent::PresenceLeave {
            identity: record.username,
            content: record.content,
            occurred_at: record.timestamp,
        }),
        FrameKind::Error => Ok(InboundEvent::ProtocolError { content: record.content }),
        FrameKind::Unknown => Err(DecodeError::UnknownKind { raw: segment.to_owned() }),
    }
}

/// Encode an outbound action into a single wire frame.
///
/// Content is trimmed before encoding. Timestamps are supplied by the caller
/// so the codec stays pure.
///
/// # Errors
///
/// - [`EncodeError::EmptyContent`] if the content trims to nothing
/// - [`EncodeError::FrameTooLarge`] if the frame exceeds [`MAX_FRAME_BYTES`]
pub fn encode(
    action: &OutboundAction,
    username: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, EncodeError> {
    let OutboundAction::ChatSend { content } = action;

    let content = content.trim();
    if content.is_empty() {
        return Err(EncodeError::EmptyContent);
    }

    let record = WireRecord {
        kind: FrameKind::Chat,
        content: content.to_owned(),
        username: username.to_owned(),
        timestamp: Some(timestamp),
    };

    let frame = serde_json::to_string(&record).map_err(|e| EncodeError::Serialize(e.to_string()))?;

    if frame.len() > MAX_FRAME_BYTES {
        return Err(EncodeError::FrameTooLarge { size: frame.len() });
    }

    Ok(frame)
}
