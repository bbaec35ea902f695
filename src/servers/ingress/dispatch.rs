//! Per-frame receive and dispatch
//!
//! One call to [`Session::next_frame`] takes the session from awaiting a
//! header through to a fully consumed frame:
//!
//! ```text
//! AwaitHeader ──"DAVE"──> AwaitCompressedBody ──> expand ──> consumer
//!      │
//!      └──command──> AwaitCommandBody ──> validate ──> consumer [──> Respond]
//! ```
//!
//! Any error ends the session. Lengths are always validated before the
//! bytes they announce are read.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::buffer::FrameSink;
use crate::compress::Decompressor;
use crate::config::IngressConfig;
use crate::network::wire::{
    classify, pixel_frame_size, CompressedEnvelope, FrameKind, StandardHeader,
    COMPRESSED_HEADER_SIZE, SENTINEL_SIZE, STANDARD_DATA_HEADER_SIZE, WIFI_COMMAND_PEAKDATA,
    WIFI_COMMAND_PIXELDATA64,
};
use crate::session::{FrameBuffer, SessionError};

/// What the session owes the sender once a frame is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Silent,
    Status,
}

/// State of one accepted connection. Buffers and collaborators are
/// borrowed from the server and outlive the session.
pub struct Session<'a, S> {
    pub stream: S,
    pub peer: SocketAddr,
    pub timeout: Duration,
    pub config: &'a IngressConfig,
    pub frame: &'a mut FrameBuffer,
    pub expanded: &'a mut [u8],
    pub staging: &'a mut Vec<u8>,
    pub decompressor: &'a mut dyn Decompressor,
    pub sink: &'a mut dyn FrameSink,
}

impl<S: AsyncRead + Unpin> Session<'_, S> {
    async fn read_until(&mut self, n: usize) -> Result<(), SessionError> {
        self.frame.read_until(&mut self.stream, n, self.timeout).await
    }

    /// Read, validate and deliver one frame.
    ///
    /// Leaves the frame in the read buffer; the caller resets it.
    pub async fn next_frame(&mut self) -> Result<Reply, SessionError> {
        self.read_until(SENTINEL_SIZE).await?;

        let mut prefix = [0u8; SENTINEL_SIZE];
        prefix.copy_from_slice(&self.frame.as_slice()[..SENTINEL_SIZE]);

        match classify(prefix) {
            FrameKind::Compressed => self.compressed_frame().await,
            FrameKind::Command { command, .. } => match command {
                WIFI_COMMAND_PEAKDATA => self.peak_frame().await,
                WIFI_COMMAND_PIXELDATA64 => self.pixel_frame().await,
                other => Err(SessionError::UnknownCommand(other)),
            },
        }
    }

    async fn read_header(&mut self) -> Result<StandardHeader, SessionError> {
        self.read_until(STANDARD_DATA_HEADER_SIZE).await?;
        StandardHeader::parse(self.frame.as_slice()).ok_or(SessionError::ShortFrame {
            wanted: STANDARD_DATA_HEADER_SIZE,
            received: self.frame.len(),
        })
    }

    async fn compressed_frame(&mut self) -> Result<Reply, SessionError> {
        self.read_until(COMPRESSED_HEADER_SIZE).await?;
        let envelope =
            CompressedEnvelope::parse(self.frame.as_slice()).ok_or(SessionError::ShortFrame {
                wanted: COMPRESSED_HEADER_SIZE,
                received: self.frame.len(),
            })?;

        tracing::debug!(
            "[ingress] [frame_compressed] peer={} compressed={} expanded={} reserved={}",
            self.peer,
            envelope.compressed_size,
            envelope.expanded_size,
            envelope.reserved
        );

        let expanded_len = envelope.expanded_size as usize;
        let max = self.config.max_packet_size.min(self.expanded.len());
        if expanded_len > max {
            return Err(SessionError::ExpandedTooLarge {
                expanded: envelope.expanded_size,
                max,
            });
        }

        let total = COMPRESSED_HEADER_SIZE.saturating_add(envelope.compressed_size as usize);
        self.read_until(total).await?;

        let body = &self.frame.as_slice()[COMPRESSED_HEADER_SIZE..total];
        let source: &[u8] = if self.config.stage_compressed {
            self.staging.clear();
            self.staging.extend_from_slice(body);
            &self.staging[..]
        } else {
            body
        };

        let output = &mut self.expanded[..expanded_len];
        self.decompressor.decompress(source, output)?;
        self.sink.accept(output).map_err(SessionError::Rejected)?;

        Ok(Reply::Silent)
    }

    async fn peak_frame(&mut self) -> Result<Reply, SessionError> {
        let header = self.read_header().await?;
        let numbands = header.channel;

        tracing::debug!(
            "[ingress] [frame_peak] peer={} numbands={} length={} seconds={} micros={}",
            self.peer,
            numbands,
            header.length,
            header.seconds,
            header.micros
        );

        if numbands != self.config.num_bands {
            return Err(SessionError::BandCount {
                expected: self.config.num_bands,
                actual: numbands,
            });
        }

        let expected = numbands as u64 * std::mem::size_of::<f32>() as u64;
        if header.length as u64 != expected {
            return Err(SessionError::PeakLength {
                expected,
                actual: header.length,
            });
        }

        let total = STANDARD_DATA_HEADER_SIZE + header.length as usize;
        self.read_until(total).await?;

        if self.config.audio_enabled {
            self.sink
                .accept(&self.frame.as_slice()[..total])
                .map_err(SessionError::Rejected)?;
        } else {
            tracing::trace!("[ingress] [frame_peak] audio disabled, dropped {} bytes", total);
        }

        Ok(Reply::Silent)
    }

    async fn pixel_frame(&mut self) -> Result<Reply, SessionError> {
        let header = self.read_header().await?;

        tracing::debug!(
            "[ingress] [frame_pixel] peer={} channel={} leds={} seconds={} micros={}",
            self.peer,
            header.channel,
            header.length,
            header.seconds,
            header.micros
        );

        let total = pixel_frame_size(header.length);
        if total > self.config.max_packet_size as u64 {
            return Err(SessionError::PixelTooLarge {
                total,
                max: self.config.max_packet_size,
            });
        }

        let total = total as usize;
        self.read_until(total).await?;
        self.sink
            .accept(&self.frame.as_slice()[..total])
            .map_err(SessionError::Rejected)?;

        Ok(Reply::Status)
    }
}
