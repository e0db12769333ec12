//! Greeting reply construction.

use bytes::BytesMut;

/// Literal prefix written in front of every inbound chunk.
pub const GREETING_PREFIX: &[u8] = b"Hello ";

/// Build the reply for one inbound chunk.
///
/// The chunk is copied byte for byte, trailing terminator included, so the
/// reply carries whatever encoding the client used.
pub fn reply(chunk: &[u8]) -> BytesMut {
    let mut response = BytesMut::with_capacity(GREETING_PREFIX.len() + chunk.len());
    response.extend_from_slice(GREETING_PREFIX);
    response.extend_from_slice(chunk);
    response
}
