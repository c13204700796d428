//! A back-pressured framed writer: queues bytes and drains them against an
//! async sink as it becomes writable, retaining partial writes.
//!
//! This is deliberately small (§2's 2% budget share): the splitter flushes
//! synchronously after every packet, so in practice its queue never holds
//! more than one packet at rest. The HTTP fan-out client is the component
//! that actually exercises sustained buffering, against its own socket.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Queues byte frames and writes them out to an async sink, retaining any
/// unwritten tail across calls.
pub struct FramedWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    /// Wraps `inner` with an empty outbound buffer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    /// Number of bytes currently queued but not yet written.
    pub fn queued_len(&self) -> usize {
        self.buf.len()
    }

    /// Appends `bytes` to the outbound queue.
    pub fn queue(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes as much of the queue as the sink accepts right now, retaining
    /// any unwritten remainder for the next call.
    pub async fn drain(&mut self) -> Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let written = self.inner.write(&self.buf).await?;
        self.buf.advance(written);
        Ok(written)
    }

    /// Queues `bytes` and writes the whole buffer out before returning.
    pub async fn queue_and_flush(&mut self, bytes: &[u8]) -> Result<()> {
        self.queue(bytes);
        while !self.buf.is_empty() {
            self.drain().await?;
        }
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_and_flush_writes_everything() {
        let mut out = Vec::new();
        let mut writer = FramedWriter::new(&mut out);
        writer.queue_and_flush(b"hello").await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn partial_drain_retains_remainder() {
        let mut out = Vec::new();
        let mut writer = FramedWriter::new(&mut out);
        writer.queue(b"abc");
        let n = writer.drain().await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(writer.queued_len(), 0);
    }

    #[tokio::test]
    async fn drain_retains_the_tail_a_short_write_leaves_behind() {
        // The mock sink only accepts 2 of the 5 queued bytes on its first
        // write, forcing drain() to retain "cde" for the following calls.
        let mock = tokio_test::io::Builder::new()
            .write(b"ab")
            .write(b"cde")
            .build();
        let mut writer = FramedWriter::new(mock);
        writer.queue(b"abcde");

        let first = writer.drain().await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(writer.queued_len(), 3);

        let second = writer.drain().await.unwrap();
        assert_eq!(second, 3);
        assert_eq!(writer.queued_len(), 0);
    }
}
