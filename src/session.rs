//! Connection session primitives
//!
//! [`FrameBuffer`] is the reusable read buffer every session reads frames
//! into, and [`SessionError`] is the set of reasons a session can end.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::compress::DecompressError;

/// Coarse classification of a [`SessionError`], used for log tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Protocol,
    Io,
    Decompression,
    Consumer,
}

/// Error types for session operations
///
/// Every variant ends the session it occurred in; none of them outlive it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Socket setup failed: {0}")]
    Connection(#[source] std::io::Error),

    #[error("Read of {requested} bytes exceeds buffer capacity {capacity}")]
    FrameTooLarge { requested: usize, capacity: usize },

    #[error("Frame holds {received} bytes, header needs {wanted}")]
    ShortFrame { wanted: usize, received: usize },

    #[error("Unknown command: {0}")]
    UnknownCommand(u16),

    #[error("Expected {expected} audio bands, got {actual}")]
    BandCount { expected: u16, actual: u16 },

    #[error("Peak payload is {actual} bytes, expected {expected} for the band count")]
    PeakLength { expected: u64, actual: u32 },

    #[error("Pixel frame of {total} bytes exceeds maximum packet size {max}")]
    PixelTooLarge { total: u64, max: usize },

    #[error("Expanded packet would be {expanded} bytes, maximum packet size is {max}")]
    ExpandedTooLarge { expanded: u32, max: usize },

    #[error("Timed out after {received} of {wanted} bytes")]
    Timeout { wanted: usize, received: usize },

    #[error("Peer closed after {received} of {wanted} bytes")]
    PeerClosed { wanted: usize, received: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    #[error("Consumer rejected frame: {0}")]
    Rejected(anyhow::Error),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Connection(_) => ErrorKind::Connection,
            SessionError::FrameTooLarge { .. }
            | SessionError::ShortFrame { .. }
            | SessionError::UnknownCommand(_)
            | SessionError::BandCount { .. }
            | SessionError::PeakLength { .. }
            | SessionError::PixelTooLarge { .. }
            | SessionError::ExpandedTooLarge { .. } => ErrorKind::Protocol,
            SessionError::Timeout { .. } | SessionError::PeerClosed { .. } | SessionError::Io(_) => {
                ErrorKind::Io
            }
            SessionError::Decompress(_) => ErrorKind::Decompression,
            SessionError::Rejected(_) => ErrorKind::Consumer,
        }
    }

    /// True for the ordinary end of a connection: the peer hung up between frames.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, SessionError::PeerClosed { received: 0, .. })
    }
}

/// Reusable frame read buffer.
///
/// Allocated once at its full capacity. `received` is the logical length;
/// [`FrameBuffer::reset`] only rewinds it.
pub struct FrameBuffer {
    data: Vec<u8>,
    received: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            received: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes accumulated for the current frame.
    pub fn len(&self) -> usize {
        self.received
    }

    pub fn is_empty(&self) -> bool {
        self.received == 0
    }

    /// Bytes accumulated for the current frame.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.received]
    }

    /// Mark the buffer logically empty. Does not reallocate.
    pub fn reset(&mut self) {
        self.received = 0;
    }

    /// Read from `reader` until the buffer holds `n` bytes.
    ///
    /// Each underlying read waits at most `timeout`. Never reads past `n`,
    /// so bytes of the following frame stay in the socket. Returns
    /// immediately if `n` bytes are already buffered.
    pub async fn read_until<R>(
        &mut self,
        reader: &mut R,
        n: usize,
        timeout: Duration,
    ) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
    {
        if n > self.capacity() {
            return Err(SessionError::FrameTooLarge {
                requested: n,
                capacity: self.capacity(),
            });
        }

        while self.received < n {
            let read = tokio::time::timeout(timeout, reader.read(&mut self.data[self.received..n]))
                .await
                .map_err(|_| SessionError::Timeout {
                    wanted: n,
                    received: self.received,
                })??;

            if read == 0 {
                return Err(SessionError::PeerClosed {
                    wanted: n,
                    received: self.received,
                });
            }

            self.received += read;
            tracing::trace!("[session] read {} bytes ({}/{})", read, self.received, n);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_frame_buffer_new() {
        let buf = FrameBuffer::new(64);
        assert_eq!(buf.capacity(), 64);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_read_until_accumulates_partial_reads() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(&[1, 2]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.write_all(&[3, 4, 5]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.write_all(&[6]).await.unwrap();
            client
        });

        let mut buf = FrameBuffer::new(16);
        buf.read_until(&mut server, 6, TIMEOUT).await.unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_does_not_overread() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).await.unwrap();

        let mut buf = FrameBuffer::new(16);
        buf.read_until(&mut server, 4, TIMEOUT).await.unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);

        // Growing the same frame picks up where it left off
        buf.read_until(&mut server, 6, TIMEOUT).await.unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);

        buf.reset();
        buf.read_until(&mut server, 2, TIMEOUT).await.unwrap();
        assert_eq!(buf.as_slice(), &[7, 8]);
    }

    #[tokio::test]
    async fn test_read_until_already_satisfied() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[9, 9, 9]).await.unwrap();

        let mut buf = FrameBuffer::new(16);
        buf.read_until(&mut server, 3, TIMEOUT).await.unwrap();
        // No more data is coming, but nothing more is needed either
        buf.read_until(&mut server, 2, TIMEOUT).await.unwrap();
        assert_eq!(buf.len(), 3);
    }

    #[tokio::test]
    async fn test_read_until_rejects_oversize_before_reading() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1, 2, 3]).await.unwrap();

        let mut buf = FrameBuffer::new(8);
        let result = buf.read_until(&mut server, 9, TIMEOUT).await;
        assert!(matches!(
            result,
            Err(SessionError::FrameTooLarge { requested: 9, capacity: 8 })
        ));
        assert_eq!(buf.len(), 0);

        // The bytes were left in the stream
        buf.read_until(&mut server, 3, TIMEOUT).await.unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_until_times_out() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1]).await.unwrap();

        let mut buf = FrameBuffer::new(8);
        let result = buf
            .read_until(&mut server, 4, Duration::from_millis(50))
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Timeout { wanted: 4, received: 1 })
        ));
        drop(client);
    }

    #[tokio::test]
    async fn test_read_until_peer_closed() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1, 2]).await.unwrap();
        drop(client);

        let mut buf = FrameBuffer::new(8);
        let err = buf.read_until(&mut server, 4, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, SessionError::PeerClosed { wanted: 4, received: 2 }));
        assert!(!err.is_clean_close());
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_reset_keeps_capacity() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1, 2, 3, 4]).await.unwrap();

        let mut buf = FrameBuffer::new(32);
        buf.read_until(&mut server, 4, TIMEOUT).await.unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 32);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SessionError::UnknownCommand(9).kind(), ErrorKind::Protocol);
        assert_eq!(
            SessionError::ExpandedTooLarge { expanded: 10, max: 5 }.kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            SessionError::Timeout { wanted: 1, received: 0 }.kind(),
            ErrorKind::Io
        );
        assert_eq!(
            SessionError::Rejected(anyhow::anyhow!("full")).kind(),
            ErrorKind::Consumer
        );
        assert!(SessionError::PeerClosed { wanted: 4, received: 0 }.is_clean_close());
    }
}
