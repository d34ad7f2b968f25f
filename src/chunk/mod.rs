mod stream;
mod reader;
mod writer;

pub use stream::*;
pub use reader::*;
pub use writer::*;

use crate::{Error, Result, MAX_CHUNK_STREAM_ID};

/// Chunk header formats
pub const CHUNK_TYPE_0: u8 = 0;
pub const CHUNK_TYPE_1: u8 = 1;
pub const CHUNK_TYPE_2: u8 = 2;
pub const CHUNK_TYPE_3: u8 = 3;

/// Largest header a single chunk can carry: 3 byte basic header, 11 byte
/// message header and the 4 byte extended timestamp
pub const MAX_CHUNK_HEADER_SIZE: usize = 18;

/// Encode the 1, 2 or 3 byte basic header
pub fn encode_basic_header(fmt: u8, cs_id: u32) -> Result<Vec<u8>> {
    if fmt > CHUNK_TYPE_3 {
        return Err(Error::chunk(format!("Invalid chunk format: {}", fmt)));
    }

    let header = if cs_id <= 63 {
        vec![(fmt << 6) | (cs_id as u8)]
    } else if cs_id <= 319 {
        vec![fmt << 6, (cs_id - 64) as u8]
    } else if cs_id <= MAX_CHUNK_STREAM_ID {
        let id = cs_id - 64;
        vec![(fmt << 6) | 1, (id & 0xFF) as u8, (id >> 8) as u8]
    } else {
        return Err(Error::chunk(format!("Chunk stream ID {} out of range", cs_id)));
    };

    Ok(header)
}

/// Parse the basic header; None when more bytes are needed
pub fn parse_basic_header(bytes: &[u8]) -> Option<(ChunkHeader, usize)> {
    let first_byte = *bytes.first()?;
    let fmt = (first_byte >> 6) & 0x03;

    let (cs_id, offset) = match first_byte & 0x3F {
        0 => ((*bytes.get(1)? as u32) + 64, 2),
        1 => {
            let id = u16::from_le_bytes([*bytes.get(1)?, *bytes.get(2)?]) as u32;
            (id + 64, 3)
        }
        n => (n as u32, 1),
    };

    Some((ChunkHeader { fmt, cs_id }, offset))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub fmt: u8,
    pub cs_id: u32,
}
