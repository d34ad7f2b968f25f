use std::time::Duration;
use url::Url;
use crate::{Error, Result};
use crate::processing::Metadata;
use crate::protocol::constants::*;
use crate::session::{NegotiationParams, ServerVariant};
use crate::utils::generate_stream_name;

/// Queue capacity used when throttling is off
const UNTHROTTLED_QUEUE_CAPACITY: usize = 4096;

/// Parsed `rtmp://host[:port]/app` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub app: String,

    /// The URI as given, sent as `tcUrl`
    pub tc_url: String,
}

impl Endpoint {
    /// Parse an endpoint URI; the app is everything after the first slash
    pub fn parse(uri: &str) -> Result<Self> {
        let parsed = Url::parse(uri)
            .map_err(|e| Error::config(format!("Invalid URL: {}", e)))?;

        match parsed.scheme() {
            "rtmp" => {}
            scheme => return Err(Error::config(format!("Unsupported scheme: {}", scheme))),
        }

        let host = parsed.host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::config("Missing host in URL"))?;
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        let app = parsed.path().trim_matches('/');
        if app.is_empty() {
            return Err(Error::config("Missing app in URL"));
        }

        Ok(Endpoint {
            host: host.to_string(),
            port,
            app: app.to_string(),
            tc_url: uri.trim_end_matches('/').to_string(),
        })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rtmp://{}:{}/{}", self.host, self.port, self.app)
    }
}

/// H.264 encoding settings
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,

    /// Bits per second
    pub bitrate: u32,
}

impl VideoProfile {
    pub fn new(width: u32, height: u32, frame_rate_numerator: u32, frame_rate_denominator: u32, bitrate: u32) -> Self {
        VideoProfile { width, height, frame_rate_numerator, frame_rate_denominator, bitrate }
    }

    pub fn frame_rate(&self) -> f64 {
        if self.frame_rate_denominator == 0 {
            return 0.0;
        }
        self.frame_rate_numerator as f64 / self.frame_rate_denominator as f64
    }
}

/// AAC encoding settings
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProfile {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,

    /// Bits per second
    pub bitrate: u32,

    /// Encoder configuration blob; the AudioSpecificConfig follows a 12 byte prefix
    pub user_data: Option<Vec<u8>>,
}

impl AudioProfile {
    pub fn new(sample_rate: u32, channels: u8, bitrate: u32) -> Self {
        AudioProfile {
            sample_rate,
            channels,
            bits_per_sample: 16,
            bitrate,
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, user_data: Vec<u8>) -> Self {
        self.user_data = Some(user_data);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Ingest target
    pub endpoint: Endpoint,

    /// Stream key
    pub stream_name: String,

    /// Command ordering the server expects
    pub server_variant: ServerVariant,

    /// Outbound chunk size
    pub chunk_size: u32,

    /// Key-frame interval in frames
    pub keyframe_interval: u32,

    /// Flush the socket after every queued message
    pub low_latency: bool,

    /// Bound the send queue so producers wait for the socket
    pub throttle: bool,

    /// Timestamp bases in ticks, used to continue numbering after a reconnect
    pub video_timestamp_base: i64,
    pub audio_timestamp_base: i64,

    pub video: Option<VideoProfile>,
    pub audio: Option<AudioProfile>,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Longest wait for each negotiation response
    pub response_timeout: Duration,

    /// Send queue capacity in messages when throttling
    pub send_queue_capacity: usize,

    /// Publish type, `live` unless recording
    pub publish_type: String,
}

impl PublishConfig {
    /// Create config builder
    pub fn builder(endpoint: &str) -> PublishConfigBuilder {
        PublishConfigBuilder::new(endpoint)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.video.is_none() && self.audio.is_none() {
            return Err(Error::config("At least one of video or audio must be configured"));
        }

        if self.stream_name.is_empty() {
            return Err(Error::config("Stream name must not be empty"));
        }

        if let Some(ref video) = self.video {
            if video.frame_rate_numerator == 0 || video.frame_rate_denominator == 0 {
                return Err(Error::config("Video frame rate must be positive"));
            }
            if video.width == 0 || video.height == 0 {
                return Err(Error::config("Video dimensions must be positive"));
            }
        }

        if let Some(ref audio) = self.audio {
            if audio.sample_rate == 0 {
                return Err(Error::config("Audio sample rate must be positive"));
            }
            if audio.channels == 0 {
                return Err(Error::config("Audio channel count must be positive"));
            }
        }

        if self.send_queue_capacity == 0 {
            return Err(Error::config("Send queue capacity must be positive"));
        }

        Ok(())
    }

    /// Queue capacity actually used by the publisher
    pub fn effective_queue_capacity(&self) -> usize {
        if self.throttle {
            self.send_queue_capacity
        } else {
            UNTHROTTLED_QUEUE_CAPACITY
        }
    }

    /// Stream description for `@setDataFrame`
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(ref video) = self.video {
            metadata = metadata.with_video(
                video.width,
                video.height,
                video.frame_rate(),
                video.bitrate,
                self.keyframe_interval,
            );
        }
        if let Some(ref audio) = self.audio {
            metadata = metadata.with_audio(audio.sample_rate, audio.channels as u32, audio.bitrate);
        }
        metadata
    }

    pub fn negotiation_params(&self) -> NegotiationParams {
        NegotiationParams {
            variant: self.server_variant,
            client_chunk_size: self.chunk_size,
            audio_codecs: self.audio.as_ref().map(|_| SUPPORT_SND_AAC),
            video_codecs: self.video.as_ref().map(|_| SUPPORT_VID_H264),
            metadata: self.metadata(),
            publish_type: self.publish_type.clone(),
            response_timeout: self.response_timeout,
        }
    }
}

/// Builder for PublishConfig
pub struct PublishConfigBuilder {
    endpoint: String,
    stream_name: Option<String>,
    server_variant: ServerVariant,
    chunk_size: u32,
    keyframe_interval: u32,
    low_latency: bool,
    throttle: bool,
    video_timestamp_base: i64,
    audio_timestamp_base: i64,
    video: Option<VideoProfile>,
    audio: Option<AudioProfile>,
    connect_timeout: Duration,
    response_timeout: Duration,
    send_queue_capacity: usize,
    publish_type: String,
}

impl PublishConfigBuilder {
    /// Create new builder
    pub fn new(endpoint: &str) -> Self {
        PublishConfigBuilder {
            endpoint: endpoint.to_string(),
            stream_name: None,
            server_variant: ServerVariant::Standard,
            chunk_size: 4096,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            low_latency: false,
            throttle: true,
            video_timestamp_base: 0,
            audio_timestamp_base: 0,
            video: None,
            audio: None,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            send_queue_capacity: 256,
            publish_type: "live".to_string(),
        }
    }

    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    pub fn server_variant(mut self, variant: ServerVariant) -> Self {
        self.server_variant = variant;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames;
        self
    }

    pub fn low_latency(mut self, enabled: bool) -> Self {
        self.low_latency = enabled;
        self
    }

    pub fn throttle(mut self, enabled: bool) -> Self {
        self.throttle = enabled;
        self
    }

    /// Continue timestamps from a previous session
    pub fn timestamp_bases(mut self, video: i64, audio: i64) -> Self {
        self.video_timestamp_base = video;
        self.audio_timestamp_base = audio;
        self
    }

    pub fn video(mut self, profile: VideoProfile) -> Self {
        self.video = Some(profile);
        self
    }

    pub fn audio(mut self, profile: AudioProfile) -> Self {
        self.audio = Some(profile);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    pub fn publish_type(mut self, publish_type: impl Into<String>) -> Self {
        self.publish_type = publish_type.into();
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<PublishConfig> {
        let config = PublishConfig {
            endpoint: Endpoint::parse(&self.endpoint)?,
            stream_name: self.stream_name.unwrap_or_else(generate_stream_name),
            server_variant: self.server_variant,
            chunk_size: self.chunk_size.clamp(DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE),
            keyframe_interval: self.keyframe_interval,
            low_latency: self.low_latency,
            throttle: self.throttle,
            video_timestamp_base: self.video_timestamp_base,
            audio_timestamp_base: self.audio_timestamp_base,
            video: self.video,
            audio: self.audio,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
            send_queue_capacity: self.send_queue_capacity,
            publish_type: self.publish_type,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        let endpoint = Endpoint::parse("rtmp://ingest.example.com/live").unwrap();
        assert_eq!(endpoint.host, "ingest.example.com");
        assert_eq!(endpoint.port, 1935);
        assert_eq!(endpoint.app, "live");
        assert_eq!(endpoint.tc_url, "rtmp://ingest.example.com/live");

        let endpoint = Endpoint::parse("rtmp://127.0.0.1:19350/app/inst/").unwrap();
        assert_eq!(endpoint.port, 19350);
        assert_eq!(endpoint.app, "app/inst");
    }

    #[test]
    fn test_endpoint_errors() {
        assert!(matches!(Endpoint::parse("rtmp://host"), Err(Error::Configuration(_))));
        assert!(matches!(Endpoint::parse("http://host/live"), Err(Error::Configuration(_))));
        assert!(matches!(Endpoint::parse("not a url"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let config = PublishConfig::builder("rtmp://host/live")
            .audio(AudioProfile::new(44100, 2, 128_000))
            .build()
            .unwrap();

        assert_eq!(config.stream_name.len(), 32);
        assert_eq!(config.server_variant, ServerVariant::Standard);
        assert_eq!(config.keyframe_interval, 60);
        assert_eq!(config.publish_type, "live");

        let params = config.negotiation_params();
        assert_eq!(params.audio_codecs, Some(0x0400));
        assert_eq!(params.video_codecs, None);
        assert_eq!(params.metadata.audio_sample_rate, Some(44100.0));
        assert_eq!(params.metadata.width, None);
    }

    #[test]
    fn test_chunk_size_clamped() {
        let config = PublishConfig::builder("rtmp://host/live")
            .video(VideoProfile::new(640, 360, 30, 1, 800_000))
            .chunk_size(16)
            .build()
            .unwrap();
        assert_eq!(config.chunk_size, 128);
    }

    #[test]
    fn test_requires_media() {
        let result = PublishConfig::builder("rtmp://host/live").build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_queue_capacity_follows_throttle() {
        let builder = || {
            PublishConfig::builder("rtmp://host/live")
                .video(VideoProfile::new(640, 360, 30000, 1001, 800_000))
                .send_queue_capacity(8)
        };
        assert_eq!(builder().build().unwrap().effective_queue_capacity(), 8);
        assert_eq!(
            builder().throttle(false).build().unwrap().effective_queue_capacity(),
            UNTHROTTLED_QUEUE_CAPACITY
        );
    }
}
