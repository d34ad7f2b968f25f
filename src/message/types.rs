use crate::protocol::constants::*;
use crate::protocol::*;
use crate::Result;
use log::warn;

/// Every message the publisher sends or understands, one case per kind
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpMessage {
    SetChunkSize(u32),
    Abort { chunk_stream_id: u32 },
    Acknowledgement { sequence_number: u32 },
    UserControl(UserControlEvent),
    WindowAckSize(u32),
    SetPeerBandwidth { window_size: u32, limit: PeerBandwidthLimit },

    /// `_result` response
    Result(RtmpCommand),

    /// `_error` response
    Error(RtmpCommand),

    /// `onStatus` notification
    OnStatus(RtmpCommand),

    /// Any other AMF0 command
    Command(RtmpCommand),

    /// AMF0 data message
    Data(RtmpData),

    Audio { timestamp: u32, payload: Vec<u8> },
    Video { timestamp: u32, payload: Vec<u8> },

    /// Recognized on the wire but not modelled (AMF3, shared objects, aggregates)
    Unknown { message_type: u8, payload: Vec<u8> },
}

impl RtmpMessage {
    /// Decode a reassembled packet by its type ID
    pub fn from_packet(packet: &RtmpPacket) -> Result<Self> {
        let payload = &packet.payload;
        let message = match packet.message_type() {
            MSG_TYPE_SET_CHUNK_SIZE => RtmpMessage::SetChunkSize(decode_set_chunk_size(payload)?),
            MSG_TYPE_ABORT => RtmpMessage::Abort { chunk_stream_id: decode_u32(payload)? },
            MSG_TYPE_ACK => RtmpMessage::Acknowledgement { sequence_number: decode_u32(payload)? },
            MSG_TYPE_USER_CONTROL => RtmpMessage::UserControl(UserControlEvent::decode(payload)?),
            MSG_TYPE_WINDOW_ACK => RtmpMessage::WindowAckSize(decode_u32(payload)?),
            MSG_TYPE_SET_PEER_BW => match decode_peer_bandwidth(payload) {
                Ok((window_size, limit)) => RtmpMessage::SetPeerBandwidth { window_size, limit },
                // Well formed but with a limit type outside 0..=2
                Err(err) if payload.len() >= 5 => {
                    warn!("Keeping peer bandwidth message raw: {}", err);
                    RtmpMessage::Unknown { message_type: MSG_TYPE_SET_PEER_BW, payload: payload.clone() }
                }
                Err(err) => return Err(err),
            },
            MSG_TYPE_COMMAND_AMF0 => {
                let command = RtmpCommand::decode(payload)?;
                match command.name.as_str() {
                    "_result" => RtmpMessage::Result(command),
                    "_error" => RtmpMessage::Error(command),
                    "onStatus" => RtmpMessage::OnStatus(command),
                    _ => RtmpMessage::Command(command),
                }
            }
            MSG_TYPE_DATA_AMF0 => RtmpMessage::Data(RtmpData::decode(payload)?),
            MSG_TYPE_AUDIO => RtmpMessage::Audio {
                timestamp: packet.timestamp(),
                payload: payload.clone(),
            },
            MSG_TYPE_VIDEO => RtmpMessage::Video {
                timestamp: packet.timestamp(),
                payload: payload.clone(),
            },
            other => RtmpMessage::Unknown {
                message_type: other,
                payload: payload.clone(),
            },
        };
        Ok(message)
    }

    /// Encode into a packet addressed to `message_stream_id`.
    ///
    /// Protocol control messages always travel on message stream 0.
    pub fn to_packet(&self, message_stream_id: u32) -> Result<RtmpPacket> {
        let packet = match self {
            RtmpMessage::SetChunkSize(size) => {
                RtmpPacket::with_payload(MSG_TYPE_SET_CHUNK_SIZE, 0, 0, encode_set_chunk_size(*size)?)
            }
            RtmpMessage::Abort { chunk_stream_id } => {
                RtmpPacket::with_payload(MSG_TYPE_ABORT, 0, 0, encode_u32(*chunk_stream_id)?)
            }
            RtmpMessage::Acknowledgement { sequence_number } => {
                RtmpPacket::with_payload(MSG_TYPE_ACK, 0, 0, encode_u32(*sequence_number)?)
            }
            RtmpMessage::UserControl(event) => {
                RtmpPacket::with_payload(MSG_TYPE_USER_CONTROL, 0, 0, event.encode()?)
            }
            RtmpMessage::WindowAckSize(size) => {
                RtmpPacket::with_payload(MSG_TYPE_WINDOW_ACK, 0, 0, encode_u32(*size)?)
            }
            RtmpMessage::SetPeerBandwidth { window_size, limit } => {
                RtmpPacket::with_payload(MSG_TYPE_SET_PEER_BW, 0, 0, encode_peer_bandwidth(*window_size, *limit)?)
            }
            RtmpMessage::Result(command)
            | RtmpMessage::Error(command)
            | RtmpMessage::OnStatus(command)
            | RtmpMessage::Command(command) => command.to_packet(message_stream_id)?,
            RtmpMessage::Data(data) => data.to_packet(message_stream_id)?,
            RtmpMessage::Audio { timestamp, payload } => {
                make_audio_packet(payload.clone(), *timestamp, message_stream_id)
            }
            RtmpMessage::Video { timestamp, payload } => {
                make_video_packet(payload.clone(), *timestamp, message_stream_id)
            }
            RtmpMessage::Unknown { message_type, payload } => {
                RtmpPacket::with_payload(*message_type, 0, message_stream_id, payload.clone())
            }
        };
        Ok(packet)
    }

    /// Short name used in logs
    pub fn name(&self) -> &str {
        match self {
            RtmpMessage::SetChunkSize(_) => "SetChunkSize",
            RtmpMessage::Abort { .. } => "Abort",
            RtmpMessage::Acknowledgement { .. } => "Acknowledgement",
            RtmpMessage::UserControl(_) => "UserControl",
            RtmpMessage::WindowAckSize(_) => "WindowAckSize",
            RtmpMessage::SetPeerBandwidth { .. } => "SetPeerBandwidth",
            RtmpMessage::Result(_) => "_result",
            RtmpMessage::Error(_) => "_error",
            RtmpMessage::OnStatus(_) => "onStatus",
            RtmpMessage::Command(command) => command.name.as_str(),
            RtmpMessage::Data(data) => data.data_type.as_str(),
            RtmpMessage::Audio { .. } => "Audio",
            RtmpMessage::Video { .. } => "Video",
            RtmpMessage::Unknown { .. } => "Unknown",
        }
    }
}
