use crate::{Error, Result};
use crate::chunk::to_chunked_bitstream;
use crate::protocol::RtmpPacket;
use async_trait::async_trait;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Destination for outbound messages.
///
/// Every packet in one call is chunked on the same chunk stream and written
/// back to back, so a batch is never interleaved with other traffic.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Queue bytes that are already framed, used for the handshake
    async fn send_raw(&self, bytes: Vec<u8>) -> Result<()>;

    async fn send_packets(&self, cs_id: u32, chunk_size: u32, packets: &[RtmpPacket]) -> Result<()> {
        let mut batch = Vec::new();
        for packet in packets {
            batch.extend_from_slice(&to_chunked_bitstream(cs_id, chunk_size, packet)?);
        }
        self.send_raw(batch).await
    }
}

/// Handle to the single ordered outbound queue.
///
/// Items are already framed bytes; one writer task drains them in FIFO order.
#[derive(Clone)]
pub struct SendQueue {
    sender: mpsc::Sender<Vec<u8>>,
    /// Longest wait for room in a full queue
    send_timeout: Option<Duration>,
}

impl SendQueue {
    /// Create new send queue and the receiving end for the writer task
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (SendQueue { sender, send_timeout: None }, receiver)
    }

    /// Fail sends that find the queue full for longer than `limit`
    pub fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = Some(limit);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl MessageSink for SendQueue {
    async fn send_raw(&self, bytes: Vec<u8>) -> Result<()> {
        let Some(limit) = self.send_timeout else {
            return self.sender.send(bytes).await
                .map_err(|_| Error::connection("Send queue is closed"));
        };
        match self.sender.send_timeout(bytes, limit).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(Error::timeout(format!("Send queue still full after {:?}", limit)))
            }
            Err(SendTimeoutError::Closed(_)) => Err(Error::connection("Send queue is closed")),
        }
    }
}

/// Drain the queue into `writer` until every handle is dropped.
///
/// With `flush_each` the writer is flushed after every item; otherwise items
/// already waiting are written together and flushed once. `on_written` sees
/// the size of each written item; the session uses it for acknowledgement
/// accounting.
pub async fn run_send_queue<W, F>(
    mut receiver: mpsc::Receiver<Vec<u8>>,
    mut writer: W,
    flush_each: bool,
    mut on_written: F,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    F: FnMut(usize),
{
    while let Some(bytes) = receiver.recv().await {
        writer.write_all(&bytes).await?;
        on_written(bytes.len());
        let mut total = bytes.len();

        if !flush_each {
            while let Ok(more) = receiver.try_recv() {
                writer.write_all(&more).await?;
                on_written(more.len());
                total += more.len();
            }
        }

        writer.flush().await?;
        trace!("Wrote {} bytes", total);
    }

    debug!("Send queue drained, shutting down writer");
    writer.shutdown().await?;
    Ok(())
}
