use crate::{Error, Result};

/// AACPacketType for the AudioSpecificConfig
pub const AAC_SEQUENCE_HEADER: u8 = 0;

/// AACPacketType for raw frames
pub const AAC_RAW: u8 = 1;

/// Bytes in front of the AudioSpecificConfig inside encoder user data
pub const AAC_USER_DATA_PREFIX: usize = 12;

// Index 4 (44.1 kHz) is the fallback for rates missing from the table
const DEFAULT_SAMPLING_FREQUENCY_INDEX: u8 = 4;

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCodec {
    /// Linear PCM, platform endian
    PCM,
    /// MP3
    MP3,
    /// AAC
    AAC,
    /// Speex
    Speex,
    /// Anything else
    Other(u8),
}

impl AudioCodec {
    pub fn sound_format(&self) -> u8 {
        match self {
            AudioCodec::PCM => 0,
            AudioCodec::MP3 => 2,
            AudioCodec::AAC => 10,
            AudioCodec::Speex => 11,
            AudioCodec::Other(format) => *format,
        }
    }

    /// FourCC written into stream metadata
    pub fn fourcc(&self) -> &str {
        match self {
            AudioCodec::AAC => "mp4a",
            AudioCodec::MP3 => ".mp3",
            AudioCodec::PCM => "lpcm",
            AudioCodec::Speex => "spex",
            AudioCodec::Other(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundRate {
    Rate5_5kHz,
    Rate11kHz,
    Rate22kHz,
    Rate44kHz,
}

impl SoundRate {
    pub fn as_bits(&self) -> u8 {
        match self {
            SoundRate::Rate5_5kHz => 0,
            SoundRate::Rate11kHz => 1,
            SoundRate::Rate22kHz => 2,
            SoundRate::Rate44kHz => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundSize {
    Bits8,
    Bits16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundType {
    Mono,
    Stereo,
}

/// First byte of every audio tag
pub fn audio_tag_marker(codec: AudioCodec, rate: SoundRate, size: SoundSize, sound: SoundType) -> u8 {
    (codec.sound_format() << 4)
        | (rate.as_bits() << 2)
        | (u8::from(size == SoundSize::Bits16) << 1)
        | u8::from(sound == SoundType::Stereo)
}

/// AAC always signals 44 kHz, 16 bit, stereo in the tag header
pub fn aac_tag_marker() -> u8 {
    audio_tag_marker(AudioCodec::AAC, SoundRate::Rate44kHz, SoundSize::Bits16, SoundType::Stereo)
}

/// Look up the sampling frequency index, falling back to 44.1 kHz
pub fn sampling_frequency_index(sample_rate: u32) -> u8 {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|index| index as u8)
        .unwrap_or(DEFAULT_SAMPLING_FREQUENCY_INDEX)
}

/// AudioSpecificConfig for the sequence header.
///
/// Encoder user data past its fixed prefix is used verbatim. Without it two
/// bytes are built from the frequency index and channel count.
pub fn audio_specific_config(sample_rate: u32, channels: u8, user_data: Option<&[u8]>) -> Vec<u8> {
    if let Some(data) = user_data {
        if data.len() > AAC_USER_DATA_PREFIX {
            return data[AAC_USER_DATA_PREFIX..].to_vec();
        }
    }

    let sfi = sampling_frequency_index(sample_rate);
    vec![(sfi << 4) | (channels & 0x0F), 0x00]
}

/// Turns raw AAC frames into audio tag payloads
pub struct AudioPacketizer {
    config: Vec<u8>,
    sequence_header_sent: bool,
}

impl AudioPacketizer {
    pub fn new(sample_rate: u32, channels: u8, user_data: Option<&[u8]>) -> Self {
        AudioPacketizer {
            config: audio_specific_config(sample_rate, channels, user_data),
            sequence_header_sent: false,
        }
    }

    pub fn sequence_header_sent(&self) -> bool {
        self.sequence_header_sent
    }

    /// Build the payloads for one frame, config first on the first call
    pub fn packetize(&mut self, frame: &[u8]) -> Result<Vec<Vec<u8>>> {
        if frame.is_empty() {
            return Err(Error::protocol("Empty audio sample"));
        }

        let marker = aac_tag_marker();
        let mut payloads = Vec::with_capacity(2);

        if !self.sequence_header_sent {
            let mut header = Vec::with_capacity(2 + self.config.len());
            header.push(marker);
            header.push(AAC_SEQUENCE_HEADER);
            header.extend_from_slice(&self.config);
            payloads.push(header);
        }

        let mut data = Vec::with_capacity(2 + frame.len());
        data.push(marker);
        data.push(AAC_RAW);
        data.extend_from_slice(frame);
        payloads.push(data);

        self.sequence_header_sent = true;
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aac_marker() {
        assert_eq!(aac_tag_marker(), 0xAF);
    }

    #[test]
    fn test_frequency_table() {
        assert_eq!(sampling_frequency_index(96000), 0);
        assert_eq!(sampling_frequency_index(48000), 3);
        assert_eq!(sampling_frequency_index(44100), 4);
        assert_eq!(sampling_frequency_index(7350), 12);
        assert_eq!(sampling_frequency_index(12345), 4);
    }

    #[test]
    fn test_synthesized_config() {
        assert_eq!(audio_specific_config(48000, 2, None), vec![0x32, 0x00]);
        // Short user data is ignored
        assert_eq!(audio_specific_config(44100, 1, Some(&[0; 12])), vec![0x41, 0x00]);
    }

    #[test]
    fn test_config_from_user_data() {
        let mut user_data = vec![0xEE; AAC_USER_DATA_PREFIX];
        user_data.extend_from_slice(&[0x12, 0x10]);
        assert_eq!(audio_specific_config(44100, 2, Some(&user_data)), vec![0x12, 0x10]);
    }

    #[test]
    fn test_packetize_sequence() {
        let mut packetizer = AudioPacketizer::new(44100, 2, None);
        let first = packetizer.packetize(&[0x21, 0x10]).unwrap();
        assert_eq!(first, vec![vec![0xAF, 0x00, 0x42, 0x00], vec![0xAF, 0x01, 0x21, 0x10]]);

        let second = packetizer.packetize(&[0x22]).unwrap();
        assert_eq!(second, vec![vec![0xAF, 0x01, 0x22]]);
        assert!(packetizer.sequence_header_sent());
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mut packetizer = AudioPacketizer::new(44100, 2, None);
        assert!(packetizer.packetize(&[]).is_err());
        assert!(!packetizer.sequence_header_sent());
    }
}
