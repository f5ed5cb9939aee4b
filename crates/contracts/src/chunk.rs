//! Chunk - the unit of data a producer writes into a sink

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How the payload of a chunk should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Opaque bytes
    #[default]
    Buffer,
    /// UTF-8 text
    Utf8,
}

/// One unit of data written through a sink
///
/// The payload is reference counted: cloning a chunk for every target
/// does not copy the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
    pub encoding: Encoding,
}

impl Chunk {
    /// Create a binary chunk
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            encoding: Encoding::Buffer,
        }
    }

    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(text.into()),
            encoding: Encoding::Utf8,
        }
    }

    pub fn with_encoding(data: impl Into<Bytes>, encoding: Encoding) -> Self {
        Self {
            data: data.into(),
            encoding,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload as text, when it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk() {
        let chunk = Chunk::text("hello");
        assert_eq!(chunk.encoding, Encoding::Utf8);
        assert_eq!(chunk.as_str(), Some("hello"));
        assert_eq!(chunk.len(), 5);
    }

    #[test]
    fn test_clone_shares_payload() {
        let chunk = Chunk::new(vec![1u8, 2, 3]);
        let copy = chunk.clone();
        assert_eq!(chunk.data.as_ptr(), copy.data.as_ptr());
    }

    #[test]
    fn test_binary_chunk_not_utf8() {
        let chunk = Chunk::new(vec![0xffu8, 0xfe]);
        assert_eq!(chunk.encoding, Encoding::Buffer);
        assert!(chunk.as_str().is_none());
    }
}
