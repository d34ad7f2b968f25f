// Message types
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;         // User control messages
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_SHARED_OBJECT_AMF3: u8 = 16;  // Shared object (AMF3)
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_SHARED_OBJECT_AMF0: u8 = 19;  // Shared object (AMF0)
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;           // Aggregate message

// User control event types
pub const USER_CONTROL_STREAM_BEGIN: u16 = 0;
pub const USER_CONTROL_STREAM_EOF: u16 = 1;
pub const USER_CONTROL_STREAM_DRY: u16 = 2;
pub const USER_CONTROL_SET_BUFFER_LENGTH: u16 = 3;
pub const USER_CONTROL_STREAM_IS_RECORDED: u16 = 4;
pub const USER_CONTROL_PING_REQUEST: u16 = 6;
pub const USER_CONTROL_PING_RESPONSE: u16 = 7;

// Peer bandwidth limit types
pub const BANDWIDTH_LIMIT_HARD: u8 = 0;
pub const BANDWIDTH_LIMIT_SOFT: u8 = 1;
pub const BANDWIDTH_LIMIT_DYNAMIC: u8 = 2;

// Codec capability flags sent with connect
pub const SUPPORT_SND_NONE: u32 = 0x0001;
pub const SUPPORT_SND_ADPCM: u32 = 0x0002;
pub const SUPPORT_SND_MP3: u32 = 0x0004;
pub const SUPPORT_SND_AAC: u32 = 0x0400;
pub const SUPPORT_VID_H264: u32 = 0x0080;

// Chunk stream IDs
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const MIN_CHUNK_STREAM_ID: u32 = 3;           // 0-2 are reserved
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;
pub const DEFAULT_WINDOW_SIZE: u32 = DEFAULT_CHUNK_SIZE * 50;
pub const DEFAULT_PORT: u16 = 1935;
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 60;
