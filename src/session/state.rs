use crate::connection::ConnectionState;
use crate::message::RtmpMessage;
use crate::protocol::constants::*;
use crate::protocol::{PeerBandwidthLimit, UserControlEvent};
use crate::{Error, Result};
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Session state shared by negotiation, the media path and the reader task
pub type SharedSessionState = Arc<Mutex<SessionState>>;

/// Mutable state of one publishing connection
#[derive(Debug)]
pub struct SessionState {
    /// Identifier used in log lines
    pub session_id: String,

    pub host: String,
    pub port: u16,
    pub app: String,
    pub tc_url: String,
    pub stream_name: String,

    /// Base epoch written into C1
    pub epoch: u32,

    phase: ConnectionState,

    /// Outbound chunk size
    client_chunk_size: u32,

    /// Inbound chunk size announced by the server
    server_chunk_size: u32,

    pub window_ack_size: u32,
    pub peer_bandwidth: u32,
    pub peer_bandwidth_limit: PeerBandwidthLimit,

    next_chunk_stream_id: u32,
    next_transaction_id: u32,

    /// Message stream returned by `createStream`
    pub message_stream_id: u32,

    pub publish_chunk_stream_id: u32,
    pub video_chunk_stream_id: u32,
    pub audio_chunk_stream_id: u32,

    bytes_sent: Arc<AtomicU64>,
    acknowledged_bytes: u64,
}

impl SessionState {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        app: impl Into<String>,
        tc_url: impl Into<String>,
        stream_name: impl Into<String>,
        epoch: u32,
    ) -> Self {
        SessionState {
            session_id: uuid::Uuid::new_v4().simple().to_string(),
            host: host.into(),
            port,
            app: app.into(),
            tc_url: tc_url.into(),
            stream_name: stream_name.into(),
            epoch,
            phase: ConnectionState::Uninitialized,
            client_chunk_size: DEFAULT_CHUNK_SIZE,
            server_chunk_size: DEFAULT_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_SIZE,
            peer_bandwidth: DEFAULT_WINDOW_SIZE,
            peer_bandwidth_limit: PeerBandwidthLimit::Hard,
            next_chunk_stream_id: MIN_CHUNK_STREAM_ID,
            next_transaction_id: 1,
            message_stream_id: 0,
            publish_chunk_stream_id: 0,
            video_chunk_stream_id: 0,
            audio_chunk_stream_id: 0,
            bytes_sent: Arc::new(AtomicU64::new(0)),
            acknowledged_bytes: 0,
        }
    }

    pub fn into_shared(self) -> SharedSessionState {
        Arc::new(Mutex::new(self))
    }

    pub fn phase(&self) -> ConnectionState {
        self.phase
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if self.phase == next {
            return Ok(());
        }
        if !self.phase.can_transition_to(next) {
            return Err(Error::invalid_state(format!(
                "Cannot move from {:?} to {:?}",
                self.phase, next
            )));
        }
        debug!("[{}] {:?} -> {:?}", self.session_id, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Hand out the next chunk stream ID; IDs 0 to 2 are reserved
    pub fn allocate_chunk_stream_id(&mut self) -> Result<u32> {
        let id = self.next_chunk_stream_id;
        if id > MAX_CHUNK_STREAM_ID {
            return Err(Error::protocol("Chunk stream IDs exhausted"));
        }
        self.next_chunk_stream_id += 1;
        Ok(id)
    }

    pub fn next_transaction_id(&mut self) -> u32 {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        id
    }

    pub fn client_chunk_size(&self) -> u32 {
        self.client_chunk_size
    }

    /// Set the outbound chunk size, clamped to 128..=0x7FFFFFFF
    pub fn set_client_chunk_size(&mut self, size: u32) -> u32 {
        self.client_chunk_size = size.clamp(DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE);
        debug!("[{}] Client chunk size {}", self.session_id, self.client_chunk_size);
        self.client_chunk_size
    }

    pub fn server_chunk_size(&self) -> u32 {
        self.server_chunk_size
    }

    pub fn set_server_chunk_size(&mut self, size: u32) {
        debug!("[{}] Server chunk size {}", self.session_id, size);
        self.server_chunk_size = size;
    }

    pub fn set_peer_bandwidth(&mut self, window_size: u32, limit: PeerBandwidthLimit) {
        self.peer_bandwidth = window_size;
        self.peer_bandwidth_limit = limit;
    }

    /// Counter the send queue writer adds to
    pub fn byte_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.bytes_sent)
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Bytes written since the server last acknowledged
    pub fn bytes_sent_since_ack(&self) -> u64 {
        self.total_bytes_sent().saturating_sub(self.acknowledged_bytes)
    }

    /// Record an Acknowledgement; the sequence number counts bytes modulo 2^32
    pub fn on_acknowledgement(&mut self, sequence_number: u32) {
        let total = self.total_bytes_sent();
        let wraps = total >> 32;
        let mut acknowledged = (wraps << 32) | sequence_number as u64;
        if acknowledged > total {
            acknowledged = acknowledged.saturating_sub(1 << 32);
        }
        self.acknowledged_bytes = acknowledged;
    }

    /// Record a protocol control message from the server.
    ///
    /// Returns the reply to send, which is only ever a ping response.
    pub fn apply_control(&mut self, message: &RtmpMessage) -> Option<RtmpMessage> {
        match message {
            RtmpMessage::SetChunkSize(size) => self.set_server_chunk_size(*size),
            RtmpMessage::WindowAckSize(size) => {
                debug!("[{}] Window acknowledgement size {}", self.session_id, size);
                self.window_ack_size = *size;
            }
            RtmpMessage::SetPeerBandwidth { window_size, limit } => {
                debug!("[{}] Peer bandwidth {} ({:?})", self.session_id, window_size, limit);
                self.set_peer_bandwidth(*window_size, *limit);
            }
            RtmpMessage::Acknowledgement { sequence_number } => {
                trace!("[{}] Acknowledged {} bytes", self.session_id, sequence_number);
                self.on_acknowledgement(*sequence_number);
            }
            RtmpMessage::UserControl(UserControlEvent::PingRequest { timestamp }) => {
                trace!("[{}] Ping {}", self.session_id, timestamp);
                return Some(RtmpMessage::UserControl(UserControlEvent::PingResponse {
                    timestamp: *timestamp,
                }));
            }
            RtmpMessage::UserControl(UserControlEvent::Unknown { event_type, .. }) => {
                warn!("[{}] Ignoring user control event {}", self.session_id, event_type);
            }
            RtmpMessage::UserControl(event) => {
                debug!("[{}] User control {:?}", self.session_id, event);
            }
            RtmpMessage::Unknown { message_type, payload } => {
                warn!("[{}] Ignoring message type {} ({} bytes)", self.session_id, message_type, payload.len());
            }
            _ => {}
        }
        None
    }
}
