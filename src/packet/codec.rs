//! Envelope Codec
//!
//! Frames [`Envelope`] values into bytes with bincode. A version or mode
//! mismatch is not a codec failure: the envelope decodes fine and callers
//! consult [`Envelope::matches`] to decide whether to drop it.

use super::types::Envelope;

use thiserror::Error;

/// Errors produced by the envelope codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope could not be serialized.
    #[error("packet could not be encoded: {0}")]
    Encode(bincode::Error),

    /// The bytes are truncated or corrupt.
    #[error("malformed packet: {0}")]
    Malformed(bincode::Error),
}

/// Serializes an envelope into datagram bytes.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(envelope).map_err(CodecError::Encode)
}

/// Deserializes datagram bytes into an envelope.
///
/// Fails only on truncated or corrupt input. Callers must still check the
/// version and mode before dispatching.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Malformed)
}
