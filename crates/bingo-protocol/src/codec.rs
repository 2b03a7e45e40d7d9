//! Codec trait and implementations for serializing allocation events.
//!
//! The allocator never talks to sockets. It publishes [`AllocationEvent`]s
//! and whatever relays them to clients picks a [`Codec`] to turn them into
//! bytes. Swapping JSON for a binary format touches nothing but the codec.
//!
//! [`AllocationEvent`]: crate::AllocationEvent

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is shared by every relay task
/// for the lifetime of the process.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The player client is a mobile web view, so JSON is what it parses
/// natively. Behind the `json` feature (enabled by default).
///
/// ## Example
///
/// ```rust
/// use bingo_protocol::{AllocationEvent, Codec, JsonCodec, RoundId};
///
/// let codec = JsonCodec;
///
/// let event = AllocationEvent::PlayerReady {
///     round_id: RoundId(3),
///     player_code: "K7QX".into(),
///     card_count: 2,
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: AllocationEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
