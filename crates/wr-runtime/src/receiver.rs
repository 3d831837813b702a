use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use wr_core::InboundFrame;

use crate::metrics::RuntimeMetrics;
use crate::partition::PartitionRouter;

/// Largest inbound frame body accepted; a bigger length prefix closes the
/// connection.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// TCP receiver that accepts connections, reads length-prefixed
/// [`InboundFrame`]s and routes them onto partitions.
pub struct Receiver {
    listener: TcpListener,
    router: PartitionRouter,
    metrics: Arc<RuntimeMetrics>,
    cancel: CancellationToken,
}

impl Receiver {
    /// Parse `"tcp://host:port"` and bind a TCP listener.
    pub async fn bind(
        listen: &str,
        router: PartitionRouter,
        metrics: Arc<RuntimeMetrics>,
    ) -> anyhow::Result<Self> {
        let addr = listen.strip_prefix("tcp://").unwrap_or(listen);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router,
            metrics,
            cancel: CancellationToken::new(),
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a clone of the cancellation token for external shutdown signaling.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the accept loop. Blocks until the cancellation token is triggered.
    #[tracing::instrument(name = "receiver", skip_all)]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = result?;
                    wr_debug!(conn, peer = %peer, "accepted connection");
                    self.metrics.inc_connection();
                    tokio::spawn(handle_connection(
                        stream,
                        self.router.clone(),
                        Arc::clone(&self.metrics),
                        self.cancel.child_token(),
                        peer,
                    ));
                }
                _ = self.cancel.cancelled() => break,
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    router: PartitionRouter,
    metrics: Arc<RuntimeMetrics>,
    cancel: CancellationToken,
    peer: SocketAddr,
) {
    let (reader, _writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(None) => break,
                    Ok(Some(payload)) => match InboundFrame::decode(&payload) {
                        Ok(frame) => {
                            if matches!(frame, InboundFrame::Watermark { .. }) {
                                metrics.inc_watermark_signal();
                            }
                            wr_trace!(pipe, ts = frame.ts(), "frame decoded");
                            if !router.route(frame).await {
                                wr_warn!(conn, peer = %peer, "partitions stopped, dropping connection");
                                break;
                            }
                        }
                        Err(e) => {
                            metrics.inc_decode_error();
                            wr_warn!(conn, error = %e.into_core(), "frame decode error");
                        }
                    },
                    Err(e) => {
                        wr_warn!(conn, error = %e, "connection read error");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    wr_debug!(conn, peer = %peer, "connection closed");
}

/// Read a single length-prefixed frame: `[4B BE u32 len][payload]`.
///
/// Returns `Ok(None)` on clean EOF (connection closed).
async fn read_frame(reader: &mut (impl AsyncReadExt + Unpin)) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let frame_len = u32::from_be_bytes(len_buf) as usize;
    if frame_len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {frame_len} exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut payload = vec![0u8; frame_len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
