//! Chunk and session identifier types
//!
//! A chunk is produced once by the encoder and shared read-only by every
//! session it is delivered to.

use bytes::Bytes;
use serde::Serialize;

/// Unique identifier for a client session
///
/// Allocated from a counter owned by the hub, so ids are never reused within
/// the hub's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable unit of encoded audio
///
/// Cheap to clone: the payload is reference-counted, never copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
}

impl Chunk {
    /// Create a chunk from any byte buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Create a chunk from static bytes
    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Take the payload
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// View of the payload starting at `offset`, sharing the same allocation
    pub(crate) fn slice_from(&self, offset: usize) -> Self {
        Self {
            data: self.data.slice(offset..),
        }
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_shares_allocation() {
        let chunk = Chunk::new(vec![1u8, 2, 3, 4]);
        let copy = chunk.clone();

        assert_eq!(chunk.data().as_ptr(), copy.data().as_ptr());
        assert_eq!(copy.len(), 4);
    }

    #[test]
    fn test_slice_from() {
        let chunk = Chunk::from_static(b"junkFRAME");
        let tail = chunk.slice_from(4);

        assert_eq!(tail.as_ref(), b"FRAME");
        assert_eq!(chunk.len(), 9);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_u64(), 42);
    }
}
