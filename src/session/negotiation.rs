use crate::connection::{ConnectionState, InboundReader};
use crate::handshake::{ClientHandshake, HANDSHAKE_SIZE};
use crate::message::{MessageSink, RtmpMessage};
use crate::processing::Metadata;
use crate::protocol::constants::*;
use crate::protocol::{RtmpCommand, RtmpPacket};
use crate::session::state::SharedSessionState;
use crate::utils::current_timestamp;
use crate::{Error, Result};
use log::{debug, info, trace};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::{timeout_at, Instant};

/// Longest wait for an FCPublish answer in the sequential variant
const FC_PUBLISH_GRACE: Duration = Duration::from_millis(500);

/// Ordering of the stream creation commands expected by the ingest server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerVariant {
    /// FCPublish and createStream are sent in one batch and answered together
    #[default]
    Standard,

    /// FCPublish is answered before createStream is sent
    Sequential,
}

/// What negotiation needs to know about the stream being published
#[derive(Debug, Clone)]
pub struct NegotiationParams {
    pub variant: ServerVariant,
    /// Chunk size announced once publishing starts
    pub client_chunk_size: u32,
    pub audio_codecs: Option<u32>,
    pub video_codecs: Option<u32>,
    pub metadata: Metadata,
    pub publish_type: String,
    /// Limit for each awaited response
    pub response_timeout: Duration,
}

/// One run of the ordered command exchange that opens a publish session.
///
/// Every step is a round trip over the same connection: outbound messages go
/// through the [`MessageSink`] and responses are read from the
/// [`InboundReader`]. Control messages that arrive while waiting are recorded
/// in the session state and pings are answered. Any `_error` or a missing
/// response aborts the whole sequence.
pub struct Negotiation<'a, S, R> {
    sink: &'a S,
    reader: &'a mut InboundReader<R>,
    session: SharedSessionState,
    params: &'a NegotiationParams,
    /// Chunk stream shared by releaseStream, FCPublish and createStream
    stream_cs_id: u32,
}

impl<'a, S, R> Negotiation<'a, S, R>
where
    S: MessageSink,
    R: AsyncRead + Unpin,
{
    pub fn new(
        sink: &'a S,
        reader: &'a mut InboundReader<R>,
        session: SharedSessionState,
        params: &'a NegotiationParams,
    ) -> Self {
        Negotiation { sink, reader, session, params, stream_cs_id: 0 }
    }

    /// Run every step, leaving the session RUNNING on success
    pub async fn run(mut self) -> Result<()> {
        self.handshake().await?;
        self.connect().await?;

        let release_tid = self.release_stream().await?;
        match self.params.variant {
            ServerVariant::Standard => self.create_stream_batched(release_tid).await?,
            ServerVariant::Sequential => self.create_stream_sequential(release_tid).await?,
        }

        self.publish().await?;
        self.set_data_frame().await?;
        self.set_chunk_size().await?;

        let mut session = self.session.lock().await;
        session.video_chunk_stream_id = session.allocate_chunk_stream_id()?;
        session.audio_chunk_stream_id = session.allocate_chunk_stream_id()?;
        session.transition(ConnectionState::Running)?;
        info!(
            "[{}] Publishing {} on message stream {}",
            session.session_id, session.stream_name, session.message_stream_id
        );
        Ok(())
    }

    async fn handshake(&mut self) -> Result<()> {
        let epoch = {
            let mut session = self.session.lock().await;
            session.transition(ConnectionState::Handshaking)?;
            session.epoch
        };

        let mut handshake = ClientHandshake::new(epoch);
        self.sink.send_raw(handshake.start()?).await?;
        debug!("Sent C0+C1");

        let deadline = self.deadline();
        let s0s1 = timeout_at(deadline, self.reader.read_exact_raw(HANDSHAKE_SIZE + 1))
            .await
            .map_err(|_| Error::timeout("No S0+S1 from server"))??;
        let c2 = handshake.on_s0s1(&s0s1, current_timestamp())?;
        self.sink.send_raw(c2).await?;
        debug!("Received S0+S1, sent C2");

        let s2 = timeout_at(deadline, self.reader.read_exact_raw(HANDSHAKE_SIZE))
            .await
            .map_err(|_| Error::timeout("No S2 from server"))??;
        handshake.on_s2(&s2)?;

        let mut session = self.session.lock().await;
        session.transition(ConnectionState::Negotiating)?;
        info!("[{}] Handshake complete with {}:{}", session.session_id, session.host, session.port);
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let (cs_id, tid, command) = {
            let mut session = self.session.lock().await;
            let cs_id = session.allocate_chunk_stream_id()?;
            let tid = session.next_transaction_id();
            let command = RtmpCommand::connect(
                tid,
                &session.app,
                &session.tc_url,
                self.params.audio_codecs,
                self.params.video_codecs,
            );
            (cs_id, tid, command)
        };

        debug!("Sending connect (transaction {})", tid);
        self.send(cs_id, &[command.to_packet(0)?]).await?;
        let response = self.await_result("connect", tid, &[]).await?;
        debug!("connect answered: {}", response.description());
        Ok(())
    }

    /// Returns the transaction to watch for a late `_error`
    async fn release_stream(&mut self) -> Result<u32> {
        let (cs_id, tid, command) = {
            let mut session = self.session.lock().await;
            let cs_id = session.allocate_chunk_stream_id()?;
            let tid = session.next_transaction_id();
            (cs_id, tid, RtmpCommand::release_stream(tid, &session.stream_name))
        };
        self.stream_cs_id = cs_id;

        debug!("Sending releaseStream (transaction {})", tid);
        self.send(cs_id, &[command.to_packet(0)?]).await?;
        Ok(tid)
    }

    async fn create_stream_batched(&mut self, release_tid: u32) -> Result<()> {
        let cs_id = self.stream_cs_id;
        let (fc_tid, create_tid, packets) = {
            let mut session = self.session.lock().await;
            let fc_tid = session.next_transaction_id();
            let create_tid = session.next_transaction_id();
            let packets = vec![
                RtmpCommand::fc_publish(fc_tid, &session.stream_name).to_packet(0)?,
                RtmpCommand::create_stream(create_tid).to_packet(0)?,
            ];
            (fc_tid, create_tid, packets)
        };

        debug!("Sending FCPublish + createStream (transactions {}, {})", fc_tid, create_tid);
        self.send(cs_id, &packets).await?;

        let response = self
            .await_result("createStream", create_tid, &[release_tid, fc_tid])
            .await?;
        self.record_stream_id(&response).await
    }

    async fn create_stream_sequential(&mut self, release_tid: u32) -> Result<()> {
        let cs_id = self.stream_cs_id;
        let (fc_tid, packet) = {
            let mut session = self.session.lock().await;
            let fc_tid = session.next_transaction_id();
            (fc_tid, RtmpCommand::fc_publish(fc_tid, &session.stream_name).to_packet(0)?)
        };

        debug!("Sending FCPublish (transaction {})", fc_tid);
        self.send(cs_id, &[packet]).await?;
        self.await_optional("FCPublish", fc_tid, &[release_tid]).await?;

        let create_tid = self.session.lock().await.next_transaction_id();
        debug!("Sending createStream (transaction {})", create_tid);
        self.send(cs_id, &[RtmpCommand::create_stream(create_tid).to_packet(0)?]).await?;

        let response = self
            .await_result("createStream", create_tid, &[release_tid, fc_tid])
            .await?;
        self.record_stream_id(&response).await
    }

    async fn record_stream_id(&mut self, response: &RtmpCommand) -> Result<()> {
        let stream_id = response
            .last_number()
            .ok_or_else(|| Error::protocol("createStream result carries no stream ID"))?;
        let mut session = self.session.lock().await;
        session.message_stream_id = stream_id as u32;
        debug!("[{}] Message stream {}", session.session_id, session.message_stream_id);
        Ok(())
    }

    async fn publish(&mut self) -> Result<()> {
        let (cs_id, packet) = {
            let mut session = self.session.lock().await;
            let cs_id = session.allocate_chunk_stream_id()?;
            session.publish_chunk_stream_id = cs_id;
            let command = RtmpCommand::publish(&session.stream_name, &self.params.publish_type);
            (cs_id, command.to_packet(session.message_stream_id)?)
        };

        debug!("Sending publish on chunk stream {}", cs_id);
        self.send(cs_id, &[packet]).await?;
        self.await_publish_status().await
    }

    async fn set_data_frame(&mut self) -> Result<()> {
        let (cs_id, packet) = {
            let mut session = self.session.lock().await;
            let cs_id = session.allocate_chunk_stream_id()?;
            let packet = self.params.metadata.to_data().to_packet(session.message_stream_id)?;
            (cs_id, packet)
        };

        debug!("Sending @setDataFrame");
        self.send(cs_id, &[packet]).await
    }

    async fn set_chunk_size(&mut self) -> Result<()> {
        let (cs_id, size) = {
            let mut session = self.session.lock().await;
            let cs_id = session.allocate_chunk_stream_id()?;
            (cs_id, session.set_client_chunk_size(self.params.client_chunk_size))
        };

        debug!("Sending SetChunkSize {}", size);
        self.send(cs_id, &[RtmpMessage::SetChunkSize(size).to_packet(0)?]).await
    }

    /// Negotiation messages always use the default chunk size
    async fn send(&self, cs_id: u32, packets: &[RtmpPacket]) -> Result<()> {
        self.sink.send_packets(cs_id, DEFAULT_CHUNK_SIZE, packets).await
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.params.response_timeout
    }

    /// Read until `_result` for `tid`.
    ///
    /// `_error` for `tid` or any of `watched` aborts.
    async fn await_result(&mut self, step: &str, tid: u32, watched: &[u32]) -> Result<RtmpCommand> {
        let deadline = self.deadline();
        loop {
            let message = self.next_before(deadline, step).await?;
            match message {
                RtmpMessage::Result(command) if command.transaction_id == tid as f64 => {
                    return Ok(command);
                }
                RtmpMessage::Error(command) => {
                    let failed = command.transaction_id as u32;
                    if failed == tid || watched.contains(&failed) {
                        return Err(Error::rejected(step, command.description()));
                    }
                    debug!("Ignoring _error for transaction {}", failed);
                }
                other => self.handle_unrelated(other).await?,
            }
        }
    }

    /// Like `await_result`, but a missing answer is not an error
    async fn await_optional(&mut self, step: &str, tid: u32, watched: &[u32]) -> Result<()> {
        let grace = FC_PUBLISH_GRACE.min(self.params.response_timeout);
        let deadline = Instant::now() + grace;
        loop {
            let message = match timeout_at(deadline, self.reader.next_message()).await {
                Ok(message) => message?,
                Err(_) => {
                    debug!("No answer to {} within {:?}, continuing", step, grace);
                    return Ok(());
                }
            };
            match message {
                RtmpMessage::Result(command) if command.transaction_id == tid as f64 => return Ok(()),
                RtmpMessage::Command(command) if command.name == "onFCPublish" => return Ok(()),
                RtmpMessage::Error(command) => {
                    let failed = command.transaction_id as u32;
                    if failed == tid || watched.contains(&failed) {
                        return Err(Error::rejected(step, command.description()));
                    }
                }
                other => self.handle_unrelated(other).await?,
            }
        }
    }

    /// Read until the publish `onStatus`
    async fn await_publish_status(&mut self) -> Result<()> {
        let deadline = self.deadline();
        loop {
            match self.next_before(deadline, "publish").await? {
                RtmpMessage::OnStatus(command) => {
                    let level = command
                        .arguments
                        .iter()
                        .find_map(|arg| arg.get_property("level").and_then(|v| v.as_string()))
                        .unwrap_or("status");
                    if level == "error" {
                        return Err(Error::rejected("publish", command.description()));
                    }
                    debug!("publish answered: {}", command.description());
                    return Ok(());
                }
                RtmpMessage::Error(command) => {
                    return Err(Error::rejected("publish", command.description()));
                }
                RtmpMessage::Result(command) if command.transaction_id == 0.0 => return Ok(()),
                other => self.handle_unrelated(other).await?,
            }
        }
    }

    async fn next_before(&mut self, deadline: Instant, step: &str) -> Result<RtmpMessage> {
        match timeout_at(deadline, self.reader.next_message()).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!("No response to {}", step))),
        }
    }

    async fn handle_unrelated(&mut self, message: RtmpMessage) -> Result<()> {
        let reply = self.session.lock().await.apply_control(&message);
        if let Some(reply) = reply {
            self.sink
                .send_packets(CHUNK_STREAM_PROTOCOL, DEFAULT_CHUNK_SIZE, &[reply.to_packet(0)?])
                .await?;
        }
        trace!("Skipped {} while negotiating", message.name());
        Ok(())
    }
}

/// Send `unpublish` and `closeStream` as one batch on the publish chunk stream
pub async fn send_close_stream<S: MessageSink + ?Sized>(
    sink: &S,
    session: &SharedSessionState,
) -> Result<()> {
    let (cs_id, chunk_size, packets) = {
        let session = session.lock().await;
        let msid = session.message_stream_id;
        let packets = vec![
            RtmpCommand::unpublish().to_packet(msid)?,
            RtmpCommand::close_stream().to_packet(msid)?,
        ];
        (session.publish_chunk_stream_id, session.client_chunk_size(), packets)
    };

    debug!("Sending unpublish + closeStream on chunk stream {}", cs_id);
    sink.send_packets(cs_id, chunk_size, &packets).await
}
