use crate::{ByteBuffer, Result, DEFAULT_CHUNK_SIZE, MSG_TYPE_SET_CHUNK_SIZE};
use crate::chunk::stream::ChunkStreamContext;
use crate::chunk::{parse_basic_header, CHUNK_TYPE_0, CHUNK_TYPE_1, CHUNK_TYPE_2, MAX_CHUNK_HEADER_SIZE};
use crate::protocol::{decode_set_chunk_size, RtmpHeader, RtmpPacket};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::ErrorKind;

/// Outcome of one `try_parse` pass over a byte buffer
#[derive(Debug, Default)]
pub struct ParsedChunks {
    /// Messages completed in this pass, in wire order
    pub packets: Vec<RtmpPacket>,

    /// Chunk stream each packet arrived on, index-aligned with `packets`
    pub chunk_stream_ids: Vec<u32>,

    /// Bytes consumed from the front of the input; the rest is an incomplete chunk
    pub consumed: usize,
}

enum ChunkStep {
    Parsed { consumed: usize, cs_id: u32, packet: Option<RtmpPacket> },
    Incomplete,
    Orphan { fmt: u8, cs_id: u32 },
}

/// Reassembles messages from interleaved chunk streams
pub struct ChunkReader {
    /// Chunk streams by ID
    chunk_streams: HashMap<u32, ChunkStreamContext>,

    /// Current chunk size for reading
    chunk_size_in: usize,
}

impl ChunkReader {
    /// Create new chunk reader
    pub fn new() -> Self {
        ChunkReader {
            chunk_streams: HashMap::new(),
            chunk_size_in: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set incoming chunk size
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size_in = size.max(1) as usize;
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size_in as u32
    }

    /// Parse every complete chunk in `data`.
    ///
    /// A Set Chunk Size message takes effect for the chunks that follow it in
    /// the same buffer. A chunk that needs a previous header on a chunk stream
    /// that has none stops the pass; the remaining bytes are reported as
    /// consumed since they cannot be framed.
    pub fn try_parse(&mut self, data: &[u8]) -> Result<ParsedChunks> {
        let mut parsed = ParsedChunks::default();

        while parsed.consumed < data.len() {
            match self.parse_chunk(&data[parsed.consumed..])? {
                ChunkStep::Parsed { consumed, cs_id, packet } => {
                    parsed.consumed += consumed;
                    if let Some(packet) = packet {
                        if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE {
                            let size = decode_set_chunk_size(&packet.payload)?;
                            debug!("Inbound chunk size changed to {}", size);
                            self.set_chunk_size(size);
                        }
                        parsed.packets.push(packet);
                        parsed.chunk_stream_ids.push(cs_id);
                    }
                }
                ChunkStep::Incomplete => break,
                ChunkStep::Orphan { fmt, cs_id } => {
                    warn!(
                        "Type {} chunk on chunk stream {} has no preceding header, dropping {} bytes",
                        fmt,
                        cs_id,
                        data.len() - parsed.consumed
                    );
                    parsed.consumed = data.len();
                    break;
                }
            }
        }

        Ok(parsed)
    }

    /// Parse one chunk without touching state unless the whole chunk is present
    fn parse_chunk(&mut self, data: &[u8]) -> Result<ChunkStep> {
        let Some((basic, basic_len)) = parse_basic_header(data) else {
            return Ok(ChunkStep::Incomplete);
        };
        let cs_id = basic.cs_id;
        let context = self.chunk_streams.get(&cs_id);

        let window = &data[..data.len().min(MAX_CHUNK_HEADER_SIZE)];
        let mut buffer = ByteBuffer::from_slice(window);
        buffer.skip(basic_len)?;

        let header = match read_message_header(&mut buffer, basic.fmt, context) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(ChunkStep::Orphan { fmt: basic.fmt, cs_id }),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(ChunkStep::Incomplete),
            Err(e) => return Err(e.into()),
        };

        let remaining = match &header {
            MessageHeader::Start { header, .. } => header.message_length as usize,
            MessageHeader::Continue => context.map(|c| c.bytes_remaining()).unwrap_or(0),
        };
        let payload_len = remaining.min(self.chunk_size_in);
        let header_len = buffer.position();
        if data.len() < header_len + payload_len {
            return Ok(ChunkStep::Incomplete);
        }

        let context = self.chunk_streams.entry(cs_id).or_default();
        match header {
            MessageHeader::Start { header, extended } => {
                if context.is_assembling() {
                    warn!("New message on chunk stream {} abandons a partial one", cs_id);
                }
                context.start_message(header, extended);
            }
            MessageHeader::Continue => {}
        }

        let packet = context.add_chunk_data(&data[header_len..header_len + payload_len]);
        Ok(ChunkStep::Parsed {
            consumed: header_len + payload_len,
            cs_id,
            packet,
        })
    }
}

impl Default for ChunkReader {
    fn default() -> Self {
        Self::new()
    }
}

enum MessageHeader {
    /// First chunk of a new message
    Start { header: RtmpHeader, extended: bool },

    /// Type 3 chunk continuing the open message
    Continue,
}

/// Read the message header of one chunk. Returns None for a chunk that
/// depends on a previous header when the chunk stream has none. A type 1
/// chunk carries everything but the stream id, which then defaults to 0.
fn read_message_header(
    buffer: &mut ByteBuffer,
    fmt: u8,
    context: Option<&ChunkStreamContext>,
) -> std::io::Result<Option<MessageHeader>> {
    let prev = context.and_then(|c| c.prev_header);

    let header = match fmt {
        CHUNK_TYPE_0 => {
            // Type 0: Full header (11 bytes)
            let timestamp = buffer.read_u24_be()?;
            let message_length = buffer.read_u24_be()?;
            let message_type = buffer.read_u8()?;
            let message_stream_id = buffer.read_u32_le()?;
            let (timestamp, extended) = read_extended(buffer, timestamp)?;
            let header = RtmpHeader::new(timestamp, message_length, message_type, message_stream_id);
            MessageHeader::Start { header, extended }
        }
        CHUNK_TYPE_1 => {
            // Type 1: Same stream ID (7 bytes)
            let delta = buffer.read_u24_be()?;
            let message_length = buffer.read_u24_be()?;
            let message_type = buffer.read_u8()?;
            let (delta, extended) = read_extended(buffer, delta)?;
            let message_stream_id = prev.map(|p| p.message_stream_id).unwrap_or(0);
            let header = RtmpHeader::new(delta, message_length, message_type, message_stream_id).as_delta();
            MessageHeader::Start { header, extended }
        }
        CHUNK_TYPE_2 => {
            // Type 2: Same length, type and stream ID (3 bytes)
            let Some(prev) = prev else {
                return Ok(None);
            };
            let delta = buffer.read_u24_be()?;
            let (delta, extended) = read_extended(buffer, delta)?;
            let header = RtmpHeader::new(delta, prev.message_length, prev.message_type, prev.message_stream_id)
                .as_delta();
            MessageHeader::Start { header, extended }
        }
        _ => {
            // Type 3: No header, continue the open message or repeat the last one
            let Some(context) = context else {
                return Ok(None);
            };
            if context.extended_timestamp {
                buffer.read_u32_be()?;
            }
            if context.is_assembling() {
                MessageHeader::Continue
            } else {
                let Some(prev) = prev else {
                    return Ok(None);
                };
                MessageHeader::Start { header: prev, extended: context.extended_timestamp }
            }
        }
    };

    Ok(Some(header))
}

fn read_extended(buffer: &mut ByteBuffer, field: u32) -> std::io::Result<(u32, bool)> {
    if field == 0xFFFFFF {
        Ok((buffer.read_u32_be()?, true))
    } else {
        Ok((field, false))
    }
}
