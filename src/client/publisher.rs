use std::sync::atomic::Ordering;
use std::sync::Arc;
use log::{debug, info, trace, warn};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use crate::{Error, Result};
use crate::client::config::PublishConfig;
use crate::client::events::{EventEmitter, PublishEvent};
use crate::connection::{connect_to_server, ConnectionState, InboundReader};
use crate::message::{run_send_queue, MessageSink, RtmpMessage, SendQueue};
use crate::processing::{
    audio_sample_interval, video_sample_interval, AudioPacketizer, MediaKind, SampleTimingState,
    TimestampSynchronizer, VideoPacketizer,
};
use crate::protocol::constants::CHUNK_STREAM_PROTOCOL;
use crate::session::{send_close_stream, MediaPipeline, MediaSample, Negotiation, SessionState, SharedSessionState};
use crate::utils::current_timestamp;

/// One outbound publish session.
///
/// `connect` returns once the server has accepted `publish`. Samples pushed
/// from any task are stamped, packetized and written in order by a single
/// writer task; a reader task keeps answering the server until `close`.
pub struct RtmpPublisher {
    config: PublishConfig,
    session: SharedSessionState,

    /// Producer side of the send queue; taken on close
    queue: Mutex<Option<SendQueue>>,

    media: Mutex<MediaPipeline>,
    emitter: Arc<EventEmitter>,
    events: Mutex<Option<mpsc::Receiver<PublishEvent>>>,

    writer_task: Mutex<Option<JoinHandle<()>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl RtmpPublisher {
    /// Connect, handshake and negotiate a publish session
    pub async fn connect(config: PublishConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint.clone();

        let session = SessionState::new(
            endpoint.host.clone(),
            endpoint.port,
            endpoint.app.clone(),
            endpoint.tc_url.clone(),
            config.stream_name.clone(),
            current_timestamp(),
        )
        .into_shared();
        let (session_id, bytes_sent) = {
            let session = session.lock().await;
            (session.session_id.clone(), session.byte_counter())
        };

        info!("[{}] Connecting to {}", session_id, endpoint);
        let stream = connect_to_server(&endpoint.host, endpoint.port, config.connect_timeout).await?;
        let (read_half, write_half) = stream.into_split();
        info!("[{}] Connected to {}", session_id, endpoint);

        let (emitter, events) = EventEmitter::new();
        let emitter = Arc::new(emitter);

        let (queue, receiver) = SendQueue::new(config.effective_queue_capacity());
        // A peer that stops reading must not block pushes or close forever
        let queue = queue.with_send_timeout(config.response_timeout);
        let writer_task = {
            let session = Arc::clone(&session);
            let emitter = Arc::clone(&emitter);
            let flush_each = config.low_latency;
            tokio::spawn(async move {
                let counted = run_send_queue(receiver, write_half, flush_each, |written| {
                    bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                });
                if let Err(err) = counted.await {
                    fail_session(&session, &emitter, &err).await;
                }
            })
        };

        let mut reader = InboundReader::new(read_half);
        let params = config.negotiation_params();
        let negotiated = Negotiation::new(&queue, &mut reader, Arc::clone(&session), &params)
            .run()
            .await;
        if let Err(err) = negotiated {
            warn!("[{}] Negotiation failed: {}", session_id, err);
            let _ = session.lock().await.transition(ConnectionState::Failed);
            drop(queue);
            writer_task.abort();
            return Err(err);
        }

        let reader_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&session),
            queue.clone(),
            Arc::clone(&emitter),
        ));

        let media = MediaPipeline::new(
            synchronizer_for(&config),
            config.video.as_ref().map(|_| VideoPacketizer::new()),
            config.audio.as_ref().map(|audio| {
                AudioPacketizer::new(audio.sample_rate, audio.channels, audio.user_data.as_deref())
            }),
        );

        Ok(RtmpPublisher {
            config,
            session,
            queue: Mutex::new(Some(queue)),
            media: Mutex::new(media),
            emitter,
            events: Mutex::new(Some(events)),
            writer_task: Mutex::new(Some(writer_task)),
            reader_task: Mutex::new(Some(reader_task)),
        })
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Current lifecycle phase
    pub async fn state(&self) -> ConnectionState {
        self.session.lock().await.phase()
    }

    pub fn session(&self) -> SharedSessionState {
        Arc::clone(&self.session)
    }

    /// Terminal event receiver; only the first call gets it
    pub async fn events(&self) -> Option<mpsc::Receiver<PublishEvent>> {
        self.events.lock().await.take()
    }

    /// The host clock started; samples before `offset` ticks are dropped
    pub async fn on_clock_start(&self, offset: i64) {
        self.media.lock().await.synchronizer_mut().on_clock_start(offset);
    }

    pub async fn push_video(&self, sample: MediaSample) -> Result<()> {
        self.push(MediaKind::Video, sample).await
    }

    pub async fn push_audio(&self, sample: MediaSample) -> Result<()> {
        self.push(MediaKind::Audio, sample).await
    }

    /// Discontinuity marker at `at` ticks; the gap is absorbed by the next sample
    pub async fn tick(&self, kind: MediaKind, at: i64) {
        self.media.lock().await.synchronizer_mut().tick(kind, at);
    }

    /// Stop sending `kind`; later samples of that kind are dropped
    pub async fn end_of_segment(&self, kind: MediaKind) {
        self.media.lock().await.synchronizer_mut().end_of_segment(kind);
    }

    async fn push(&self, kind: MediaKind, sample: MediaSample) -> Result<()> {
        let configured = match kind {
            MediaKind::Video => self.config.video.is_some(),
            MediaKind::Audio => self.config.audio.is_some(),
        };
        if !configured {
            return Err(Error::invalid_state(format!("No {} profile configured", kind.name())));
        }

        let queue = self
            .queue
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::invalid_state("Publisher is closed"))?;

        let mut media = self.media.lock().await;
        match media.push(kind, &sample, &queue, &self.session).await {
            Ok(sent) => {
                if sent == 0 {
                    trace!("Dropped {} sample at {}", kind.name(), sample.pts);
                }
                Ok(())
            }
            Err(err) => {
                fail_session(&self.session, &self.emitter, &err).await;
                Err(err)
            }
        }
    }

    /// Send unpublish and closeStream, then tear the connection down.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        let Some(queue) = self.queue.lock().await.take() else {
            return Ok(());
        };

        let (session_id, was_running) = {
            let mut session = self.session.lock().await;
            let was_running = session.phase() == ConnectionState::Running;
            if !session.phase().is_terminal() {
                session.transition(ConnectionState::Closing)?;
            }
            (session.session_id.clone(), was_running)
        };

        if was_running {
            if let Err(err) = send_close_stream(&queue, &self.session).await {
                warn!("[{}] Failed to queue closeStream: {}", session_id, err);
            }
        }

        if let Some(reader) = self.reader_task.lock().await.take() {
            reader.abort();
            let _ = reader.await;
        }

        // The writer drains what is queued, then shuts the socket down
        drop(queue);
        if let Some(mut writer) = self.writer_task.lock().await.take() {
            if tokio::time::timeout(self.config.response_timeout, &mut writer).await.is_err() {
                warn!("[{}] Writer did not drain in time", session_id);
                writer.abort();
            }
        }

        {
            let mut session = self.session.lock().await;
            if session.phase() == ConnectionState::Closing {
                session.transition(ConnectionState::Closed)?;
            }
        }

        let (last_video_timestamp, last_audio_timestamp) = {
            let mut media = self.media.lock().await;
            let last = (
                media.synchronizer().last_dts(MediaKind::Video),
                media.synchronizer().last_dts(MediaKind::Audio),
            );
            media.synchronizer_mut().reset();
            last
        };
        self.emitter.closed(&session_id, PublishEvent::Closed {
            endpoint: self.config.endpoint.to_string(),
            stream_name: self.config.stream_name.clone(),
            last_video_timestamp,
            last_audio_timestamp,
        });
        info!("[{}] Closed {}", session_id, self.config.endpoint);
        Ok(())
    }
}

impl Drop for RtmpPublisher {
    fn drop(&mut self) {
        if let Some(reader) = self.reader_task.get_mut().take() {
            reader.abort();
        }
        if let Some(writer) = self.writer_task.get_mut().take() {
            writer.abort();
        }
    }
}

fn synchronizer_for(config: &PublishConfig) -> TimestampSynchronizer {
    let video_interval = config
        .video
        .as_ref()
        .map(|video| video_sample_interval(video.frame_rate_numerator, video.frame_rate_denominator))
        .unwrap_or(0);
    let audio_interval = config
        .audio
        .as_ref()
        .map(|audio| audio_sample_interval(audio.sample_rate))
        .unwrap_or(0);

    TimestampSynchronizer::new(
        SampleTimingState::new(MediaKind::Video, video_interval, config.video_timestamp_base),
        SampleTimingState::new(MediaKind::Audio, audio_interval, config.audio_timestamp_base),
    )
}

/// Move the session to FAILED and raise the failure event once
async fn fail_session(session: &SharedSessionState, emitter: &EventEmitter, err: &Error) {
    let mut session = session.lock().await;
    match session.phase() {
        ConnectionState::Closing | ConnectionState::Closed => {
            debug!("[{}] Ignoring error while closing: {}", session.session_id, err);
            return;
        }
        _ => {}
    }
    let _ = session.transition(ConnectionState::Failed);
    emitter.fail(&session.session_id, err);
}

/// Handle server traffic after negotiation until the connection ends
async fn read_loop<R>(
    mut reader: InboundReader<R>,
    session: SharedSessionState,
    queue: SendQueue,
    emitter: Arc<EventEmitter>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let handled = match reader.next_message().await {
            Ok(message) => handle_inbound(message, &session, &queue).await,
            Err(err) => Err(err),
        };
        if let Err(err) = handled {
            fail_session(&session, &emitter, &err).await;
            return;
        }
    }
}

async fn handle_inbound(message: RtmpMessage, session: &SharedSessionState, queue: &SendQueue) -> Result<()> {
    match message {
        RtmpMessage::Error(command) => Err(Error::rejected(command.name.clone(), command.description())),
        RtmpMessage::OnStatus(command) => {
            let level = command
                .arguments
                .iter()
                .find_map(|arg| arg.get_property("level").and_then(|v| v.as_string()))
                .unwrap_or("status");
            if level == "error" {
                return Err(Error::rejected("onStatus", command.description()));
            }
            debug!("onStatus: {}", command.description());
            Ok(())
        }
        other => {
            let (reply, chunk_size) = {
                let mut session = session.lock().await;
                (session.apply_control(&other), session.client_chunk_size())
            };
            if let Some(reply) = reply {
                queue.send_packets(CHUNK_STREAM_PROTOCOL, chunk_size, &[reply.to_packet(0)?]).await?;
            }
            Ok(())
        }
    }
}
