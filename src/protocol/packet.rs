use crate::protocol::constants::*;

/// A complete logical RTMP message, independent of its chunk framing
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpPacket {
    pub header: RtmpHeader,
    pub payload: Vec<u8>,
}

impl RtmpPacket {
    /// Create new packet
    pub fn new(header: RtmpHeader, payload: Vec<u8>) -> Self {
        RtmpPacket { header, payload }
    }

    /// Build a packet with an absolute timestamp; the length comes from the payload
    pub fn with_payload(message_type: u8, timestamp: u32, message_stream_id: u32, payload: Vec<u8>) -> Self {
        let header = RtmpHeader::new(timestamp, payload.len() as u32, message_type, message_stream_id);
        RtmpPacket { header, payload }
    }

    /// Get message type
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Get message stream ID
    pub fn message_stream_id(&self) -> u32 {
        self.header.message_stream_id
    }

    /// Get timestamp
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    /// Check if this is an audio packet
    pub fn is_audio(&self) -> bool {
        self.header.message_type == MSG_TYPE_AUDIO
    }

    /// Check if this is a video packet
    pub fn is_video(&self) -> bool {
        self.header.message_type == MSG_TYPE_VIDEO
    }

    /// Check if this is a command message
    pub fn is_command(&self) -> bool {
        self.header.message_type == MSG_TYPE_COMMAND_AMF0 ||
            self.header.message_type == MSG_TYPE_COMMAND_AMF3
    }

    /// Check if this is a data message
    pub fn is_data(&self) -> bool {
        self.header.message_type == MSG_TYPE_DATA_AMF0 ||
            self.header.message_type == MSG_TYPE_DATA_AMF3
    }

    /// Check if this is a control message
    pub fn is_control(&self) -> bool {
        matches!(self.header.message_type,
            MSG_TYPE_SET_CHUNK_SIZE |
            MSG_TYPE_ABORT |
            MSG_TYPE_ACK |
            MSG_TYPE_USER_CONTROL |
            MSG_TYPE_WINDOW_ACK |
            MSG_TYPE_SET_PEER_BW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtmpHeader {
    /// Absolute timestamp in ms, or a delta when `timestamp_is_delta` is set
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
    pub timestamp_is_delta: bool,
}

impl RtmpHeader {
    /// Create new header
    pub fn new(
        timestamp: u32,
        message_length: u32,
        message_type: u8,
        message_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            timestamp_is_delta: false,
        }
    }

    /// Mark the timestamp as a delta from the previous message on the chunk stream
    pub fn as_delta(mut self) -> Self {
        self.timestamp_is_delta = true;
        self
    }

    /// Check if timestamp needs the extended field (>= 0xFFFFFF)
    pub fn has_extended_timestamp(&self) -> bool {
        self.timestamp >= 0xFFFFFF
    }

    /// Get timestamp for the 24-bit wire field
    pub fn wire_timestamp(&self) -> u32 {
        if self.has_extended_timestamp() {
            0xFFFFFF
        } else {
            self.timestamp
        }
    }
}

pub fn make_audio_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    RtmpPacket::with_payload(MSG_TYPE_AUDIO, timestamp, stream_id, data)
}

pub fn make_video_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    RtmpPacket::with_payload(MSG_TYPE_VIDEO, timestamp, stream_id, data)
}
