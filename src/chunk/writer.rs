use crate::{ByteBuffer, Error, Result, DEFAULT_CHUNK_SIZE};
use crate::chunk::{encode_basic_header, CHUNK_TYPE_0, CHUNK_TYPE_1, CHUNK_TYPE_3};
use crate::protocol::RtmpPacket;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const MAX_MESSAGE_LENGTH: usize = 0xFF_FFFF;

/// Split a message into chunks on one chunk stream.
///
/// The first chunk carries a type 0 header, or type 1 when the message
/// timestamp is a delta. Every later chunk is type 3. An empty payload still
/// produces one header-only chunk.
pub fn to_chunked_bitstream(cs_id: u32, chunk_size: u32, packet: &RtmpPacket) -> Result<Vec<u8>> {
    if chunk_size == 0 {
        return Err(Error::chunk("Chunk size must be positive"));
    }
    let payload_len = packet.payload.len();
    if payload_len > MAX_MESSAGE_LENGTH {
        return Err(Error::chunk(format!("Message of {} bytes does not fit a 24-bit length", payload_len)));
    }

    let chunk_size = chunk_size as usize;
    let header = &packet.header;
    let extended = header.has_extended_timestamp();
    let fmt = if header.timestamp_is_delta { CHUNK_TYPE_1 } else { CHUNK_TYPE_0 };

    let num_chunks = payload_len.div_ceil(chunk_size).max(1);
    let mut buffer = ByteBuffer::with_capacity(payload_len + num_chunks * 8 + 16);

    // First chunk with the full header
    buffer.write_bytes(&encode_basic_header(fmt, cs_id)?)?;
    buffer.write_u24_be(header.wire_timestamp())?;
    buffer.write_u24_be(payload_len as u32)?;
    buffer.write_u8(header.message_type)?;
    if fmt == CHUNK_TYPE_0 {
        buffer.write_u32_le(header.message_stream_id)?;
    }
    if extended {
        buffer.write_u32_be(header.timestamp)?;
    }

    let first_chunk_size = payload_len.min(chunk_size);
    buffer.write_bytes(&packet.payload[..first_chunk_size])?;

    // Continuation chunks repeat the extended timestamp when the first one had it
    let continuation = encode_basic_header(CHUNK_TYPE_3, cs_id)?;
    let mut offset = first_chunk_size;
    while offset < payload_len {
        buffer.write_bytes(&continuation)?;
        if extended {
            buffer.write_u32_be(header.timestamp)?;
        }
        let chunk_end = (offset + chunk_size).min(payload_len);
        buffer.write_bytes(&packet.payload[offset..chunk_end])?;
        offset = chunk_end;
    }

    Ok(buffer.into_vec())
}

/// Writes chunked messages to an async sink at the current outbound chunk size
pub struct ChunkWriter {
    chunk_size_out: u32,
}

impl ChunkWriter {
    /// Create new chunk writer
    pub fn new() -> Self {
        ChunkWriter {
            chunk_size_out: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set outgoing chunk size
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size_out = size;
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size_out
    }

    /// Chunk a packet at the current size
    pub fn create_chunks(&self, cs_id: u32, packet: &RtmpPacket) -> Result<Vec<u8>> {
        to_chunked_bitstream(cs_id, self.chunk_size_out, packet)
    }

    /// Write packet as chunks
    pub async fn write_packet<W: AsyncWrite + Unpin>(
        &self,
        cs_id: u32,
        packet: &RtmpPacket,
        writer: &mut W
    ) -> Result<usize> {
        let chunks = self.create_chunks(cs_id, packet)?;

        writer.write_all(&chunks).await
            .map_err(|e| Error::chunk(format!("Failed to write chunks: {}", e)))?;

        writer.flush().await
            .map_err(|e| Error::chunk(format!("Failed to flush: {}", e)))?;

        Ok(chunks.len())
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RtmpHeader, MSG_TYPE_COMMAND_AMF0, MSG_TYPE_VIDEO};

    fn packet(len: usize, timestamp: u32) -> RtmpPacket {
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        RtmpPacket::with_payload(MSG_TYPE_VIDEO, timestamp, 1, payload)
    }

    #[test]
    fn test_type0_header_layout() {
        let bytes = to_chunked_bitstream(6, 128, &packet(3, 0x010203)).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x06,
                0x01, 0x02, 0x03,   // timestamp
                0x00, 0x00, 0x03,   // length
                MSG_TYPE_VIDEO,
                0x01, 0x00, 0x00, 0x00, // stream id, little endian
                0x00, 0x01, 0x02,
            ]
        );
    }

    #[test]
    fn test_continuation_chunks_are_type3() {
        let bytes = to_chunked_bitstream(4, 128, &packet(300, 0)).unwrap();
        // 12 + 128, then 1 + 128, then 1 + 44
        assert_eq!(bytes.len(), 12 + 128 + 1 + 128 + 1 + 44);
        assert_eq!(bytes[140], 0xC4);
        assert_eq!(bytes[269], 0xC4);
    }

    #[test]
    fn test_delta_uses_type1() {
        let header = RtmpHeader::new(40, 2, MSG_TYPE_COMMAND_AMF0, 0).as_delta();
        let bytes = to_chunked_bitstream(3, 128, &RtmpPacket::new(header, vec![1, 2])).unwrap();
        assert_eq!(bytes[0], 0x43);
        assert_eq!(bytes.len(), 1 + 7 + 2);
    }

    #[test]
    fn test_empty_payload_emits_one_chunk() {
        let bytes = to_chunked_bitstream(3, 128, &packet(0, 0)).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_extended_timestamp_written() {
        let bytes = to_chunked_bitstream(3, 4, &packet(6, 0x0100_0000)).unwrap();
        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[0x01, 0x00, 0x00, 0x00]);
        // type 3 continuation: basic header, extended timestamp, 2 bytes
        assert_eq!(&bytes[20..], &[0xC3, 0x01, 0x00, 0x00, 0x00, 0x04, 0x05]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(to_chunked_bitstream(3, 0, &packet(1, 0)).is_err());
    }

    #[tokio::test]
    async fn test_write_packet() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4096);
        let mut sink = Vec::new();
        let written = writer.write_packet(6, &packet(1000, 0), &mut sink).await.unwrap();
        assert_eq!(written, 12 + 1000);
        assert_eq!(sink.len(), written);
    }
}
