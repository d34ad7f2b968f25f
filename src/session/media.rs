use crate::connection::ConnectionState;
use crate::message::MessageSink;
use crate::processing::{AudioPacketizer, MediaKind, TimestampSynchronizer, VideoPacketizer};
use crate::protocol::{make_audio_packet, make_video_packet, RtmpPacket};
use crate::session::state::SharedSessionState;
use crate::{Error, Result};
use log::trace;

/// One encoded access unit from the host pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSample {
    /// Presentation time in 100 ns ticks
    pub pts: i64,

    /// Decode time in ticks; `None` or negative means same as `pts`
    pub dts: Option<i64>,

    pub is_keyframe: bool,

    /// Annex B access unit for video, raw AAC frame for audio
    pub data: Vec<u8>,
}

impl MediaSample {
    pub fn new(pts: i64, data: Vec<u8>) -> Self {
        MediaSample {
            pts,
            dts: None,
            is_keyframe: false,
            data,
        }
    }

    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn keyframe(mut self, is_keyframe: bool) -> Self {
        self.is_keyframe = is_keyframe;
        self
    }
}

/// Timestamping and packetizing for both media kinds.
///
/// A sample is stamped, turned into tag payloads and queued as one batch on
/// its kind's chunk stream, so configuration records always precede the
/// frame they describe.
pub struct MediaPipeline {
    synchronizer: TimestampSynchronizer,
    video: Option<VideoPacketizer>,
    audio: Option<AudioPacketizer>,
}

impl MediaPipeline {
    pub fn new(
        synchronizer: TimestampSynchronizer,
        video: Option<VideoPacketizer>,
        audio: Option<AudioPacketizer>,
    ) -> Self {
        MediaPipeline { synchronizer, video, audio }
    }

    pub fn synchronizer(&self) -> &TimestampSynchronizer {
        &self.synchronizer
    }

    pub fn synchronizer_mut(&mut self) -> &mut TimestampSynchronizer {
        &mut self.synchronizer
    }

    /// Stamp, packetize and queue one sample.
    ///
    /// Returns how many messages were queued; 0 means the sample was dropped
    /// because it precedes the clock start or its kind has ended.
    pub async fn push<S: MessageSink + ?Sized>(
        &mut self,
        kind: MediaKind,
        sample: &MediaSample,
        sink: &S,
        session: &SharedSessionState,
    ) -> Result<usize> {
        match kind {
            MediaKind::Video if self.video.is_none() => {
                return Err(Error::invalid_state("No video profile configured"));
            }
            MediaKind::Audio if self.audio.is_none() => {
                return Err(Error::invalid_state("No audio profile configured"));
            }
            _ => {}
        }

        let Some(stamps) = self.synchronizer.on_sample(kind, sample.pts, sample.dts) else {
            return Ok(0);
        };

        let payloads = match kind {
            MediaKind::Video => match self.video.as_mut() {
                Some(video) => video.packetize(&sample.data, sample.is_keyframe, stamps.composition_offset)?,
                None => return Ok(0),
            },
            MediaKind::Audio => match self.audio.as_mut() {
                Some(audio) => audio.packetize(&sample.data)?,
                None => return Ok(0),
            },
        };

        let (cs_id, chunk_size, packets) = {
            let session = session.lock().await;
            if session.phase() != ConnectionState::Running {
                return Err(Error::invalid_state(format!(
                    "Cannot send media in state {:?}",
                    session.phase()
                )));
            }
            let msid = session.message_stream_id;
            let (cs_id, packets): (u32, Vec<RtmpPacket>) = match kind {
                MediaKind::Video => (
                    session.video_chunk_stream_id,
                    payloads
                        .into_iter()
                        .map(|payload| make_video_packet(payload, stamps.timestamp, msid))
                        .collect(),
                ),
                MediaKind::Audio => (
                    session.audio_chunk_stream_id,
                    payloads
                        .into_iter()
                        .map(|payload| make_audio_packet(payload, stamps.timestamp, msid))
                        .collect(),
                ),
            };
            (cs_id, session.client_chunk_size(), packets)
        };

        trace!(
            "Queueing {} {} message(s) at {} ms (cts {})",
            packets.len(),
            kind.name(),
            stamps.timestamp,
            stamps.composition_offset
        );
        sink.send_packets(cs_id, chunk_size, &packets).await?;
        Ok(packets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{audio_sample_interval, video_sample_interval, SampleTimingState};
    use crate::session::state::SessionState;
    use crate::utils::millis_to_ticks;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureSink {
        sent: Mutex<Vec<(u32, u32, RtmpPacket)>>,
    }

    #[async_trait]
    impl MessageSink for CaptureSink {
        async fn send_raw(&self, _bytes: Vec<u8>) -> Result<()> {
            Ok(())
        }

        async fn send_packets(&self, cs_id: u32, chunk_size: u32, packets: &[RtmpPacket]) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            for packet in packets {
                sent.push((cs_id, chunk_size, packet.clone()));
            }
            Ok(())
        }
    }

    fn running_session() -> SharedSessionState {
        let mut session = SessionState::new("localhost", 1935, "live", "rtmp://localhost/live", "s", 0);
        session.transition(ConnectionState::Handshaking).unwrap();
        session.transition(ConnectionState::Negotiating).unwrap();
        session.transition(ConnectionState::Running).unwrap();
        session.message_stream_id = 1;
        session.video_chunk_stream_id = 8;
        session.audio_chunk_stream_id = 9;
        session.set_client_chunk_size(4096);
        session.into_shared()
    }

    fn pipeline() -> MediaPipeline {
        let mut synchronizer = TimestampSynchronizer::new(
            SampleTimingState::new(MediaKind::Video, video_sample_interval(30, 1), 0),
            SampleTimingState::new(MediaKind::Audio, audio_sample_interval(44100), 0),
        );
        synchronizer.on_clock_start(0);
        MediaPipeline::new(
            synchronizer,
            Some(VideoPacketizer::new()),
            Some(AudioPacketizer::new(44100, 2, None)),
        )
    }

    fn key_frame() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xC0, 0x1F,
            0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C,
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84,
        ]
    }

    #[tokio::test]
    async fn test_first_video_sample_sends_header_and_frame() {
        let sink = CaptureSink::default();
        let session = running_session();
        let mut media = pipeline();

        let sample = MediaSample::new(0, key_frame()).keyframe(true);
        assert_eq!(media.push(MediaKind::Video, &sample, &sink, &session).await.unwrap(), 2);

        let next = MediaSample::new(millis_to_ticks(33), vec![0x00, 0x00, 0x01, 0x41, 0x9A]);
        assert_eq!(media.push(MediaKind::Video, &next, &sink, &session).await.unwrap(), 1);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(cs_id, chunk_size, _)| *cs_id == 8 && *chunk_size == 4096));
        assert_eq!(sent[0].2.payload[..2], [0x17, 0x00]);
        assert_eq!(sent[1].2.payload[..2], [0x17, 0x01]);
        assert_eq!(sent[0].2.timestamp(), sent[1].2.timestamp());
        assert_eq!(sent[2].2.payload[0], 0x27);
        assert_eq!(sent[2].2.timestamp(), 33);
        assert_eq!(sent[2].2.message_stream_id(), 1);
    }

    #[tokio::test]
    async fn test_audio_uses_audio_chunk_stream() {
        let sink = CaptureSink::default();
        let session = running_session();
        let mut media = pipeline();

        let sample = MediaSample::new(millis_to_ticks(23), vec![0x21, 0x00]);
        assert_eq!(media.push(MediaKind::Audio, &sample, &sink, &session).await.unwrap(), 2);

        let sent = sink.sent.lock().unwrap();
        assert!(sent.iter().all(|(cs_id, _, packet)| *cs_id == 9 && packet.is_audio()));
        assert_eq!(sent[0].2.payload, vec![0xAF, 0x00, 0x42, 0x00]);
        assert_eq!(sent[1].2.timestamp(), 23);
    }

    #[tokio::test]
    async fn test_dropped_sample_sends_nothing() {
        let sink = CaptureSink::default();
        let session = running_session();
        let mut media = pipeline();
        media.synchronizer_mut().end_of_segment(MediaKind::Audio);

        let sample = MediaSample::new(0, vec![0x21]);
        assert_eq!(media.push(MediaKind::Audio, &sample, &sink, &session).await.unwrap(), 0);
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_running_rejected() {
        let sink = CaptureSink::default();
        let session = SessionState::new("h", 1935, "a", "rtmp://h/a", "s", 0).into_shared();
        let mut media = pipeline();

        let sample = MediaSample::new(0, vec![0x21]);
        assert!(media.push(MediaKind::Audio, &sample, &sink, &session).await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_kind_rejected() {
        let sink = CaptureSink::default();
        let session = running_session();
        let mut media = MediaPipeline::new(pipeline().synchronizer().clone(), Some(VideoPacketizer::new()), None);

        let sample = MediaSample::new(0, vec![0x21]);
        assert!(matches!(
            media.push(MediaKind::Audio, &sample, &sink, &session).await,
            Err(Error::InvalidState(_))
        ));
    }
}
