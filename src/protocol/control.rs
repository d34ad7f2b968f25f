use crate::protocol::constants::*;
use crate::{ByteBuffer, Error, Result};

/// Limit type carried by Set Peer Bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerBandwidthLimit {
    #[default]
    Hard,
    Soft,
    Dynamic,
}

impl PeerBandwidthLimit {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            BANDWIDTH_LIMIT_HARD => Ok(PeerBandwidthLimit::Hard),
            BANDWIDTH_LIMIT_SOFT => Ok(PeerBandwidthLimit::Soft),
            BANDWIDTH_LIMIT_DYNAMIC => Ok(PeerBandwidthLimit::Dynamic),
            other => Err(Error::protocol(format!("Unknown peer bandwidth limit type: {}", other))),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PeerBandwidthLimit::Hard => BANDWIDTH_LIMIT_HARD,
            PeerBandwidthLimit::Soft => BANDWIDTH_LIMIT_SOFT,
            PeerBandwidthLimit::Dynamic => BANDWIDTH_LIMIT_DYNAMIC,
        }
    }
}

/// User control events (message type 4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin { stream_id: u32 },
    StreamEof { stream_id: u32 },
    StreamDry { stream_id: u32 },
    SetBufferLength { stream_id: u32, buffer_length: u32 },
    StreamIsRecorded { stream_id: u32 },
    PingRequest { timestamp: u32 },
    PingResponse { timestamp: u32 },

    /// Event types with no meaning for a publisher (SWF verification, buffer empty/ready)
    Unknown { event_type: u16, data: Vec<u8> },
}

impl UserControlEvent {
    pub fn event_type(&self) -> u16 {
        match self {
            UserControlEvent::StreamBegin { .. } => USER_CONTROL_STREAM_BEGIN,
            UserControlEvent::StreamEof { .. } => USER_CONTROL_STREAM_EOF,
            UserControlEvent::StreamDry { .. } => USER_CONTROL_STREAM_DRY,
            UserControlEvent::SetBufferLength { .. } => USER_CONTROL_SET_BUFFER_LENGTH,
            UserControlEvent::StreamIsRecorded { .. } => USER_CONTROL_STREAM_IS_RECORDED,
            UserControlEvent::PingRequest { .. } => USER_CONTROL_PING_REQUEST,
            UserControlEvent::PingResponse { .. } => USER_CONTROL_PING_RESPONSE,
            UserControlEvent::Unknown { event_type, .. } => *event_type,
        }
    }

    /// Encode as a 6 byte payload, or 10 bytes for SetBufferLength
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(10);
        buffer.write_u16_be(self.event_type())?;
        match self {
            UserControlEvent::StreamBegin { stream_id }
            | UserControlEvent::StreamEof { stream_id }
            | UserControlEvent::StreamDry { stream_id }
            | UserControlEvent::StreamIsRecorded { stream_id } => buffer.write_u32_be(*stream_id)?,
            UserControlEvent::SetBufferLength { stream_id, buffer_length } => {
                buffer.write_u32_be(*stream_id)?;
                buffer.write_u32_be(*buffer_length)?;
            }
            UserControlEvent::PingRequest { timestamp }
            | UserControlEvent::PingResponse { timestamp } => buffer.write_u32_be(*timestamp)?,
            UserControlEvent::Unknown { data, .. } => buffer.write_bytes(data)?,
        }
        Ok(buffer.into_vec())
    }

    /// Event types outside the known set are kept as raw data
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_slice(payload);
        let event_type = buffer.read_u16_be()?;
        let event = match event_type {
            USER_CONTROL_STREAM_BEGIN => UserControlEvent::StreamBegin { stream_id: buffer.read_u32_be()? },
            USER_CONTROL_STREAM_EOF => UserControlEvent::StreamEof { stream_id: buffer.read_u32_be()? },
            USER_CONTROL_STREAM_DRY => UserControlEvent::StreamDry { stream_id: buffer.read_u32_be()? },
            USER_CONTROL_SET_BUFFER_LENGTH => UserControlEvent::SetBufferLength {
                stream_id: buffer.read_u32_be()?,
                buffer_length: buffer.read_u32_be()?,
            },
            USER_CONTROL_STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded { stream_id: buffer.read_u32_be()? },
            USER_CONTROL_PING_REQUEST => UserControlEvent::PingRequest { timestamp: buffer.read_u32_be()? },
            USER_CONTROL_PING_RESPONSE => UserControlEvent::PingResponse { timestamp: buffer.read_u32_be()? },
            other => {
                let remaining = buffer.remaining();
                UserControlEvent::Unknown { event_type: other, data: buffer.read_bytes(remaining)? }
            }
        };
        Ok(event)
    }
}

/// Set Chunk Size payload. The top bit must be clear.
pub fn encode_set_chunk_size(chunk_size: u32) -> Result<Vec<u8>> {
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::protocol(format!("Chunk size {} exceeds 0x7FFFFFFF", chunk_size)));
    }
    encode_u32(chunk_size)
}

pub fn decode_set_chunk_size(payload: &[u8]) -> Result<u32> {
    Ok(decode_u32(payload)? & MAX_CHUNK_SIZE)
}

/// Abort, Acknowledgement and Window Acknowledgement Size all carry one u32
pub fn encode_u32(value: u32) -> Result<Vec<u8>> {
    let mut buffer = ByteBuffer::with_capacity(4);
    buffer.write_u32_be(value)?;
    Ok(buffer.into_vec())
}

pub fn decode_u32(payload: &[u8]) -> Result<u32> {
    let mut buffer = ByteBuffer::from_slice(payload);
    Ok(buffer.read_u32_be()?)
}

pub fn encode_peer_bandwidth(window_size: u32, limit: PeerBandwidthLimit) -> Result<Vec<u8>> {
    let mut buffer = ByteBuffer::with_capacity(5);
    buffer.write_u32_be(window_size)?;
    buffer.write_u8(limit.as_u8())?;
    Ok(buffer.into_vec())
}

pub fn decode_peer_bandwidth(payload: &[u8]) -> Result<(u32, PeerBandwidthLimit)> {
    let mut buffer = ByteBuffer::from_slice(payload);
    let window_size = buffer.read_u32_be()?;
    let limit = PeerBandwidthLimit::from_u8(buffer.read_u8()?)?;
    Ok((window_size, limit))
}
