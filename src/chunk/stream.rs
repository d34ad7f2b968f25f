use crate::protocol::{RtmpPacket, RtmpHeader};

/// Per chunk stream reassembly state
#[derive(Debug, Clone, Default)]
pub struct ChunkStreamContext {
    /// Last header received on a type 0, 1 or 2 chunk
    pub prev_header: Option<RtmpHeader>,

    /// Whether the last full header used the extended timestamp field
    pub extended_timestamp: bool,

    /// Partial message being assembled
    message_buffer: Vec<u8>,

    /// Bytes remaining for current message
    bytes_remaining: usize,
}

impl ChunkStreamContext {
    /// Create new chunk stream context
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    /// Start new message, dropping any partial one
    pub fn start_message(&mut self, header: RtmpHeader, extended_timestamp: bool) {
        self.prev_header = Some(header);
        self.extended_timestamp = extended_timestamp;
        self.bytes_remaining = header.message_length as usize;
        self.message_buffer.clear();
        self.message_buffer.reserve(header.message_length as usize);
    }

    /// Add chunk data to message buffer; returns the packet once complete
    pub fn add_chunk_data(&mut self, data: &[u8]) -> Option<RtmpPacket> {
        self.message_buffer.extend_from_slice(data);
        self.bytes_remaining = self.bytes_remaining.saturating_sub(data.len());

        if self.bytes_remaining > 0 {
            return None;
        }

        let header = self.prev_header?;
        Some(RtmpPacket::new(header, std::mem::take(&mut self.message_buffer)))
    }
}
