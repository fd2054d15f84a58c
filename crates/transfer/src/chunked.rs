use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::DEFAULT_CHUNK_SIZE;

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads an async byte source in fixed-size chunks.
///
/// Every chunk except the last is exactly `chunk_size` bytes, regardless of
/// how the underlying source frames its reads. This keeps progress reporting
/// independent of network packetisation.
pub struct ChunkReader<R> {
    inner: R,
    chunk_size: usize,
    offset: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps `inner`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (1 MiB) is used.
    pub fn new(inner: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            inner,
            chunk_size,
            offset: 0,
            done: false,
        }
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        self.offset += filled as u64;
        Ok(Some(buf.freeze()))
    }

    /// Bytes produced so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_all_in_fixed_chunks() {
        let data: &[u8] = b"AABBCCDDEE";
        let mut reader = ChunkReader::new(data, 4);

        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), &b"AABB"[..]);
        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), &b"CCDD"[..]);
        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), &b"EE"[..]);
        assert!(reader.next_chunk().await.unwrap().is_none());
        assert_eq!(reader.offset(), 10);
    }

    #[tokio::test]
    async fn coalesces_small_reads() {
        // The mock yields 3-byte reads; chunks must still be 8 bytes.
        let mock = tokio_test::io::Builder::new()
            .read(b"abc")
            .read(b"def")
            .read(b"ghi")
            .read(b"jk")
            .build();
        let mut reader = ChunkReader::new(mock, 8);

        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), &b"abcdefgh"[..]);
        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), &b"ijk"[..]);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        let data: &[u8] = b"";
        let mut reader = ChunkReader::new(data, 4);
        assert!(reader.next_chunk().await.unwrap().is_none());
        assert_eq!(reader.offset(), 0);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_chunk() {
        let data: &[u8] = b"12345678";
        let mut reader = ChunkReader::new(data, 4);
        assert!(reader.next_chunk().await.unwrap().is_some());
        assert!(reader.next_chunk().await.unwrap().is_some());
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[test]
    fn zero_chunk_size_uses_default() {
        let data: &[u8] = b"x";
        let reader = ChunkReader::new(data, 0);
        assert_eq!(reader.chunk_size(), DEFAULT_CHUNK_SIZE);
    }
}
