use crate::amf::Amf0Value;
use crate::processing::audio::AudioCodec;
use crate::processing::video::VideoCodec;
use crate::protocol::RtmpData;

/// Stream description sent with `@setDataFrame`.
///
/// Only the fields of the configured media kinds are present; a video-only
/// stream carries no audio properties and the other way round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    // Video properties
    pub framerate: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub video_codec_id: Option<String>,
    pub video_data_rate: Option<f64>,
    pub video_keyframe_frequency: Option<f64>,

    // Audio properties
    pub audio_codec_id: Option<String>,
    pub audio_sample_rate: Option<f64>,
    pub audio_channels: Option<f64>,
    pub audio_data_rate: Option<f64>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add H.264 video properties; data rate is sent in kbps
    pub fn with_video(
        mut self,
        width: u32,
        height: u32,
        framerate: f64,
        bitrate_bps: u32,
        keyframe_frequency: u32,
    ) -> Self {
        self.framerate = Some(framerate);
        self.width = Some(width as f64);
        self.height = Some(height as f64);
        self.video_codec_id = Some(VideoCodec::H264.fourcc().to_string());
        self.video_data_rate = Some((bitrate_bps / 1000) as f64);
        self.video_keyframe_frequency = Some(keyframe_frequency as f64);
        self
    }

    /// Add AAC audio properties; data rate is sent in kbps
    pub fn with_audio(mut self, sample_rate: u32, channels: u32, bitrate_bps: u32) -> Self {
        self.audio_codec_id = Some(AudioCodec::AAC.fourcc().to_string());
        self.audio_sample_rate = Some(sample_rate as f64);
        self.audio_channels = Some(channels as f64);
        self.audio_data_rate = Some((bitrate_bps / 1000) as f64);
        self
    }

    /// Create AMF object for sending, video properties first
    pub fn to_amf(&self) -> Amf0Value {
        let mut props = Vec::new();

        push_number(&mut props, "framerate", self.framerate);
        push_number(&mut props, "width", self.width);
        push_number(&mut props, "height", self.height);
        if let Some(ref codec) = self.video_codec_id {
            props.push(("videocodecid".to_string(), Amf0Value::string(codec.as_str())));
        }
        push_number(&mut props, "videodatarate", self.video_data_rate);
        push_number(&mut props, "videokeyframe_frequency", self.video_keyframe_frequency);

        if let Some(ref codec) = self.audio_codec_id {
            props.push(("audiocodecid".to_string(), Amf0Value::string(codec.as_str())));
        }
        push_number(&mut props, "audiosamplerate", self.audio_sample_rate);
        push_number(&mut props, "audiochannels", self.audio_channels);
        push_number(&mut props, "audiodatarate", self.audio_data_rate);

        Amf0Value::Object(props)
    }

    /// `@setDataFrame` message carrying this metadata
    pub fn to_data(&self) -> RtmpData {
        RtmpData::set_data_frame(self.to_amf())
    }

}

fn push_number(props: &mut Vec<(String, Amf0Value)>, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        props.push((name.to_string(), Amf0Value::Number(value)));
    }
}
