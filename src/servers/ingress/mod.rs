pub mod dispatch;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::buffer::{BufferManager, FrameSink, SharedBuffers, Telemetry};
use crate::compress::{Decompressor, ZlibDecompressor};
use crate::config::IngressConfig;
use crate::network::response::ResponseBuilder;
use crate::session::{FrameBuffer, SessionError};
use dispatch::{Reply, Session};

/// Pause after a failed accept so a persistent failure does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Ingress server state.
///
/// Owns the read buffer, the expansion buffers and the response sequence,
/// all of which are reused by every connection. Connections are served
/// one at a time, so none of it needs locking.
pub struct IngressServer {
    config: IngressConfig,
    frame: FrameBuffer,
    expanded: Vec<u8>,
    staging: Vec<u8>,
    responder: ResponseBuilder,
    decompressor: Box<dyn Decompressor>,
    sink: Box<dyn FrameSink>,
    telemetry: Arc<dyn Telemetry>,
}

impl IngressServer {
    pub fn new(
        config: IngressConfig,
        decompressor: Box<dyn Decompressor>,
        sink: Box<dyn FrameSink>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let max = config.max_packet_size;
        let staging = if config.stage_compressed {
            Vec::with_capacity(max)
        } else {
            Vec::new()
        };
        Self {
            frame: FrameBuffer::new(max),
            expanded: vec![0u8; max],
            staging,
            responder: ResponseBuilder::new(config.flash_version),
            config,
            decompressor,
            sink,
            telemetry,
        }
    }

    /// Server backed by an in-memory [`BufferManager`] and zlib expansion.
    /// The returned handle gives a renderer access to the same ring.
    pub fn with_buffer_manager(config: IngressConfig) -> (Self, SharedBuffers) {
        let buffers = SharedBuffers::new(BufferManager::new(config.buffer_count, config.brightness));
        let server = Self::new(
            config,
            Box::new(ZlibDecompressor),
            Box::new(buffers.clone()),
            Arc::new(buffers.clone()),
        );
        (server, buffers)
    }

    pub fn config(&self) -> &IngressConfig {
        &self.config
    }

    /// Sequence number the next status response will carry.
    pub fn next_sequence(&self) -> u64 {
        self.responder.next_sequence()
    }

    /// Accept and serve connections one at a time, forever.
    pub async fn run(&mut self, listener: TcpListener) -> Result<()> {
        tracing::info!("[ingress] [ready] addr={}", listener.local_addr()?);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("[ingress] [accept_failed] {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                let err = SessionError::Connection(e);
                tracing::warn!("[ingress] [conn_dropped] peer={} {}", peer, err);
                continue;
            }

            let _ = self.serve_connection(stream, peer).await;
        }
    }

    /// Serve one connection until it fails or the peer hangs up.
    ///
    /// Returns the reason the session ended. The read buffer is always
    /// reset before returning; dropping `stream` closes the socket.
    pub async fn serve_connection<S>(&mut self, stream: S, peer: SocketAddr) -> SessionError
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::info!("[ingress] [conn_open] peer={}", peer);

        let IngressServer {
            config,
            frame,
            expanded,
            staging,
            responder,
            decompressor,
            sink,
            telemetry,
        } = self;

        let mut session = Session {
            stream,
            peer,
            timeout: config.receive_timeout(),
            config,
            frame,
            expanded: &mut expanded[..],
            staging,
            decompressor: &mut **decompressor,
            sink: &mut **sink,
        };

        let reason = loop {
            let reply = match session.next_frame().await {
                Ok(reply) => reply,
                Err(e) => break e,
            };
            session.frame.reset();

            if reply == Reply::Status {
                let response = responder.build(&**telemetry);
                tracing::trace!(
                    "[ingress] [status_out] peer={} sequence={}",
                    peer,
                    response.sequence
                );
                // Not fatal: the frame is already consumed.
                if let Err(e) = session.stream.write_all(&response.encode()).await {
                    tracing::warn!("[ingress] [status_send_failed] peer={} {}", peer, e);
                }
            }
        };
        session.frame.reset();

        if reason.is_clean_close() {
            tracing::info!("[ingress] [conn_closed] peer={}", peer);
        } else {
            tracing::warn!(
                "[ingress] [conn_aborted] peer={} kind={:?} {}",
                peer,
                reason.kind(),
                reason
            );
        }
        reason
    }
}
