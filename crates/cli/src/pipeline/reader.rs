//! Splits an input stream into chunks.

use bytes::BytesMut;
use contracts::Chunk;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// How input is cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Up to this many bytes per chunk, as soon as they are available
    Bytes(usize),
    /// One chunk per line, terminator included
    Lines,
}

/// Reads [`Chunk`]s from a buffered async reader
pub struct ChunkReader<R> {
    reader: R,
    mode: ReadMode,
    /// Partial line kept across cancelled reads
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, mode: ReadMode) -> Self {
        Self {
            reader,
            mode,
            line: Vec::new(),
        }
    }

    /// Next chunk, or `None` at end of input
    ///
    /// Cancel safe: a line interrupted halfway is resumed by the next call.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Chunk>> {
        match self.mode {
            ReadMode::Bytes(size) => {
                let mut buf = BytesMut::with_capacity(size.max(1));
                let n = (&mut self.reader)
                    .take(size.max(1) as u64)
                    .read_buf(&mut buf)
                    .await?;
                if n == 0 {
                    return Ok(None);
                }
                Ok(Some(Chunk::new(buf.freeze())))
            }
            ReadMode::Lines => {
                self.reader.read_until(b'\n', &mut self.line).await?;
                if self.line.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Chunk::new(std::mem::take(&mut self.line))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect<R: AsyncBufRead + Unpin>(mut reader: ChunkReader<R>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            out.push(String::from_utf8(chunk.data.to_vec()).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_fixed_size_chunks() {
        let reader = ChunkReader::new(&b"abcdefg"[..], ReadMode::Bytes(3));
        assert_eq!(collect(reader).await, vec!["abc", "def", "g"]);
    }

    #[tokio::test]
    async fn test_line_chunks_keep_terminator() {
        let reader = ChunkReader::new(&b"one\ntwo\nrest"[..], ReadMode::Lines);
        assert_eq!(collect(reader).await, vec!["one\n", "two\n", "rest"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mut reader = ChunkReader::new(&b""[..], ReadMode::Lines);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }
}
