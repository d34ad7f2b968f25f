use crate::{Error, Result};
use crate::chunk::ChunkReader;
use crate::message::RtmpMessage;
use log::{trace, warn};
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUFFER_SIZE: usize = 8192;

/// Read side of a connection: raw handshake bytes first, then dechunked messages
pub struct InboundReader<R> {
    reader: R,

    /// Dechunker, owns the inbound chunk size
    chunk_reader: ChunkReader,

    /// Bytes read but not yet consumed
    buffer: Vec<u8>,

    /// Messages parsed but not yet handed out
    pending: VecDeque<RtmpMessage>,

    /// Total bytes read from the socket
    bytes_received: u64,
}

impl<R: AsyncRead + Unpin> InboundReader<R> {
    pub fn new(reader: R) -> Self {
        InboundReader {
            reader,
            chunk_reader: ChunkReader::new(),
            buffer: Vec::with_capacity(READ_BUFFER_SIZE),
            pending: VecDeque::new(),
            bytes_received: 0,
        }
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Read exactly `len` unframed bytes
    pub async fn read_exact_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        while self.buffer.len() < len {
            self.fill().await?;
        }
        let rest = self.buffer.split_off(len);
        Ok(std::mem::replace(&mut self.buffer, rest))
    }

    /// Next complete message from the server
    pub async fn next_message(&mut self) -> Result<RtmpMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            if !self.buffer.is_empty() {
                let parsed = self.chunk_reader.try_parse(&self.buffer)?;
                self.buffer.drain(..parsed.consumed);
                for packet in parsed.packets {
                    let message = RtmpMessage::from_packet(&packet)?;
                    trace!("Received {} on stream {}", message.name(), packet.message_stream_id());
                    self.pending.push_back(message);
                }
                if !self.pending.is_empty() {
                    continue;
                }
            }

            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_BUFFER_SIZE];
        let n = self.reader.read(&mut chunk).await?;
        if n == 0 {
            if !self.buffer.is_empty() {
                warn!("Connection closed with {} unparsed bytes", self.buffer.len());
            }
            return Err(Error::connection("Connection closed by server"));
        }
        self.bytes_received += n as u64;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
