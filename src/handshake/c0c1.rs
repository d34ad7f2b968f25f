use crate::{ByteBuffer, Error, Result};
use crate::utils::generate_random_bytes;

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Handshake packet size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// Size of the random block after the two time fields
pub const HANDSHAKE_RANDOM_SIZE: usize = HANDSHAKE_SIZE - 8;

/// Client handshake (C0 + C1)
#[derive(Debug, Clone, PartialEq)]
pub struct C0C1 {
    /// RTMP version (C0)
    pub version: u8,

    /// Base epoch of the session (C1)
    pub timestamp: u32,

    /// Zero (C1) - should be 0
    pub zero: u32,

    /// Random data (C1)
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Parse C0+C1 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 1 + HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "C0+C1 is {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE
            )));
        }

        // Parse C0
        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported RTMP version: {}, expected {}",
                version, RTMP_VERSION
            )));
        }

        // Parse C1
        let mut buffer = ByteBuffer::from_slice(&data[1..]);
        let timestamp = buffer.read_u32_be()?;
        let zero = buffer.read_u32_be()?;
        let random_data = buffer.read_bytes(HANDSHAKE_RANDOM_SIZE)?;

        Ok(C0C1 {
            version,
            timestamp,
            zero,
            random_data,
        })
    }

    /// Create C0+C1 for a client whose session started at `epoch`
    pub fn create_client(epoch: u32) -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: epoch,
            zero: 0,
            random_data: generate_random_bytes(HANDSHAKE_RANDOM_SIZE),
        }
    }

    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.random_data.len() != HANDSHAKE_RANDOM_SIZE {
            return Err(Error::handshake("C1 random block must be 1528 bytes"));
        }

        let mut buffer = ByteBuffer::with_capacity(1 + HANDSHAKE_SIZE);

        // C0
        buffer.write_u8(self.version)?;

        // C1
        buffer.write_u32_be(self.timestamp)?;
        buffer.write_u32_be(self.zero)?;
        buffer.write_bytes(&self.random_data)?;

        Ok(buffer.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c0c1_creation() {
        let c0c1 = C0C1::create_client(1234);
        assert_eq!(c0c1.version, RTMP_VERSION);
        assert_eq!(c0c1.timestamp, 1234);
        assert_eq!(c0c1.zero, 0);
        assert_eq!(c0c1.random_data.len(), HANDSHAKE_RANDOM_SIZE);
    }

    #[test]
    fn test_c0c1_round_trip() {
        let original = C0C1::create_client(99);
        let bytes = original.encode().unwrap();
        assert_eq!(bytes.len(), 1537);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(&bytes[5..9], &[0, 0, 0, 0]);

        let parsed = C0C1::parse(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_c0c1_wrong_version() {
        let mut bytes = C0C1::create_client(0).encode().unwrap();
        bytes[0] = 6;
        assert!(C0C1::parse(&bytes).is_err());
    }
}
