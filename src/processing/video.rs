use crate::processing::nal::{find_nal_units, NalUnit, NAL_TYPE_PPS, NAL_TYPE_SPS};
use crate::{ByteBuffer, Error, Result};

/// AVCPacketType for the decoder configuration record
pub const AVC_SEQUENCE_HEADER: u8 = 0;

/// AVCPacketType for length-prefixed NAL units
pub const AVC_NALU: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoCodec {
    /// Sorenson H.263
    H263,
    /// On2 VP6
    VP6,
    /// H.264 AVC
    H264,
    /// Unknown
    Unknown(u8),
}

impl VideoCodec {
    pub fn codec_id(&self) -> u8 {
        match self {
            VideoCodec::H263 => 2,
            VideoCodec::VP6 => 4,
            VideoCodec::H264 => 7,
            VideoCodec::Unknown(id) => *id,
        }
    }

    /// FourCC written into stream metadata
    pub fn fourcc(&self) -> &str {
        match self {
            VideoCodec::H264 => "avc1",
            VideoCodec::H263 => "h263",
            VideoCodec::VP6 => "vp6f",
            VideoCodec::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameType {
    /// Keyframe (I-frame)
    Keyframe,
    /// Inter-frame (P-frame)
    InterFrame,
    /// Disposable inter-frame
    DisposableInterFrame,
}

impl FrameType {
    pub fn as_bits(&self) -> u8 {
        match self {
            FrameType::Keyframe => 1,
            FrameType::InterFrame => 2,
            FrameType::DisposableInterFrame => 3,
        }
    }
}

/// First byte of every video tag: frame type in the high nibble, codec in the low one
pub fn video_tag_marker(frame_type: FrameType, codec: VideoCodec) -> u8 {
    (frame_type.as_bits() << 4) | (codec.codec_id() & 0x0F)
}

/// AVCDecoderConfigurationRecord with 4 byte NAL length fields
#[derive(Debug, Clone, PartialEq)]
pub struct AvcDecoderConfig {
    /// AVC profile
    pub profile: u8,

    /// AVC profile compatibility
    pub profile_compat: u8,

    /// AVC level
    pub level: u8,

    /// SPS (Sequence Parameter Sets)
    pub sps: Vec<Vec<u8>>,

    /// PPS (Picture Parameter Sets)
    pub pps: Vec<Vec<u8>>,
}

impl AvcDecoderConfig {
    /// Collect parameter sets from an access unit.
    ///
    /// Profile and level come from the first SPS.
    pub fn from_nal_units(nals: &[NalUnit<'_>]) -> Result<Self> {
        let sps: Vec<Vec<u8>> = nals.iter()
            .filter(|nal| nal.nal_type == NAL_TYPE_SPS)
            .map(|nal| nal.data().to_vec())
            .collect();
        let pps: Vec<Vec<u8>> = nals.iter()
            .filter(|nal| nal.nal_type == NAL_TYPE_PPS)
            .map(|nal| nal.data().to_vec())
            .collect();

        let first = nals.iter()
            .find(|nal| nal.nal_type == NAL_TYPE_SPS)
            .ok_or_else(|| Error::protocol("First video sample carries no SPS"))?
            .rbsp();
        if first.len() < 4 {
            return Err(Error::protocol(format!("SPS too short: {} bytes", first.len())));
        }
        if sps.len() > 0x1F || pps.len() > 0xFF {
            return Err(Error::protocol("Too many parameter sets for one configuration record"));
        }

        // Profile and level come from the payload with emulation prevention removed
        Ok(AvcDecoderConfig {
            profile: first[1],
            profile_compat: first[2],
            level: first[3],
            sps,
            pps,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(64);
        buffer.write_u8(1)?;
        buffer.write_u8(self.profile)?;
        buffer.write_u8(self.profile_compat)?;
        buffer.write_u8(self.level)?;
        buffer.write_u8(0xFF)?;

        buffer.write_u8(0xE0 | self.sps.len() as u8)?;
        for sps in &self.sps {
            write_parameter_set(&mut buffer, sps)?;
        }

        buffer.write_u8(self.pps.len() as u8)?;
        for pps in &self.pps {
            write_parameter_set(&mut buffer, pps)?;
        }

        Ok(buffer.into_vec())
    }
}

fn write_parameter_set(buffer: &mut ByteBuffer, data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len())
        .map_err(|_| Error::protocol("Parameter set longer than 65535 bytes"))?;
    buffer.write_u16_be(len)?;
    buffer.write_bytes(data)?;
    Ok(())
}

/// Turns Annex B access units into H.264 video tag payloads
pub struct VideoPacketizer {
    sequence_header_sent: bool,
}

impl VideoPacketizer {
    pub fn new() -> Self {
        VideoPacketizer {
            sequence_header_sent: false,
        }
    }

    pub fn sequence_header_sent(&self) -> bool {
        self.sequence_header_sent
    }

    /// Build the payloads for one access unit.
    ///
    /// The first call yields the sequence header followed by the frame; later
    /// calls yield only the frame. `composition_offset` is the wire PTS minus
    /// the wire DTS and is written as 24 bits.
    pub fn packetize(
        &mut self,
        access_unit: &[u8],
        is_keyframe: bool,
        composition_offset: u32,
    ) -> Result<Vec<Vec<u8>>> {
        let nals = find_nal_units(access_unit);
        if nals.is_empty() {
            return Err(Error::protocol("Video sample contains no NAL units"));
        }

        let frame_type = if is_keyframe { FrameType::Keyframe } else { FrameType::InterFrame };
        let marker = video_tag_marker(frame_type, VideoCodec::H264);

        let mut payloads = Vec::with_capacity(2);
        if !self.sequence_header_sent {
            let config = AvcDecoderConfig::from_nal_units(&nals)?;
            let mut header = ByteBuffer::with_capacity(64);
            header.write_u8(marker)?;
            header.write_u8(AVC_SEQUENCE_HEADER)?;
            header.write_u24_be(0)?;
            header.write_bytes(&config.encode()?)?;
            payloads.push(header.into_vec());
        }

        let mut frame = ByteBuffer::with_capacity(access_unit.len() + 5 + nals.len() * 4);
        frame.write_u8(marker)?;
        frame.write_u8(AVC_NALU)?;
        frame.write_u24_be(composition_offset & 0x00FF_FFFF)?;
        for nal in &nals {
            frame.write_u32_be(nal.len() as u32)?;
            frame.write_bytes(nal.data())?;
        }
        payloads.push(frame.into_vec());

        self.sequence_header_sent = true;
        Ok(payloads)
    }
}

impl Default for VideoPacketizer {
    fn default() -> Self {
        Self::new()
    }
}
