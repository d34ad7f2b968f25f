use crate::{ByteBuffer, Error, Result};
use crate::handshake::c0c1::{C0C1, RTMP_VERSION, HANDSHAKE_SIZE, HANDSHAKE_RANDOM_SIZE};
use crate::utils::generate_random_bytes;

/// Server version byte and S1 block
#[derive(Debug, Clone, PartialEq)]
pub struct S0S1 {
    /// S1 timestamp, the server epoch
    pub timestamp: u32,

    /// S1 second time field
    pub zero: u32,

    /// S1 random data
    pub random_data: Vec<u8>,
}

impl S0S1 {
    /// Parse exactly 1537 bytes of S0+S1
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 1 + HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "S0+S1 is {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE
            )));
        }

        if data[0] != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Server answered with RTMP version {}, expected {}",
                data[0], RTMP_VERSION
            )));
        }

        let mut buffer = ByteBuffer::from_slice(&data[1..]);
        Ok(S0S1 {
            timestamp: buffer.read_u32_be()?,
            zero: buffer.read_u32_be()?,
            random_data: buffer.read_bytes(HANDSHAKE_RANDOM_SIZE)?,
        })
    }

    /// Build C2: server epoch, our receipt time, then S1's random bytes verbatim
    pub fn create_c2(&self, receipt_time: u32) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.timestamp)?;
        buffer.write_u32_be(receipt_time)?;
        buffer.write_bytes(&self.random_data)?;
        Ok(buffer.into_vec())
    }
}

/// Check that S2 echoes the epoch and random bytes we sent in C1
pub fn validate_s2(s2: &[u8], c0c1: &C0C1) -> Result<()> {
    if s2.len() != HANDSHAKE_SIZE {
        return Err(Error::handshake(format!(
            "S2 is {} bytes, expected {}",
            s2.len(),
            HANDSHAKE_SIZE
        )));
    }

    let mut buffer = ByteBuffer::from_slice(s2);
    let echoed_timestamp = buffer.read_u32_be()?;
    let _server_time = buffer.read_u32_be()?;
    let echoed_random = buffer.read_bytes(HANDSHAKE_RANDOM_SIZE)?;

    if echoed_timestamp != c0c1.timestamp {
        return Err(Error::handshake(format!(
            "S2 epoch {} does not echo C1 epoch {}",
            echoed_timestamp, c0c1.timestamp
        )));
    }

    if echoed_random != c0c1.random_data {
        return Err(Error::handshake("S2 random data does not echo C1"));
    }

    Ok(())
}

/// Server handshake (S0 + S1 + S2), as an ingest server would answer
#[derive(Debug, Clone)]
pub struct S0S1S2 {
    /// RTMP version (S0)
    pub version: u8,

    /// S1 timestamp
    pub s1_timestamp: u32,

    /// S1 random data
    pub s1_random: Vec<u8>,

    /// S2 timestamp (echo of C1 timestamp)
    pub s2_timestamp: u32,

    /// S2 timestamp2 (server time when C1 was read)
    pub s2_timestamp2: u32,

    /// S2 random echo (echo of C1 random)
    pub s2_random_echo: Vec<u8>,
}

impl S0S1S2 {
    /// Generate S0+S1+S2 response for C0+C1
    pub fn generate(c0c1: &C0C1, server_epoch: u32) -> Self {
        S0S1S2 {
            version: RTMP_VERSION,
            s1_timestamp: server_epoch,
            s1_random: generate_random_bytes(HANDSHAKE_RANDOM_SIZE),
            s2_timestamp: c0c1.timestamp,
            s2_timestamp2: server_epoch,
            s2_random_echo: c0c1.random_data.clone(),
        }
    }

    /// Encode S0+S1, the 1537 bytes a client reads first
    pub fn encode_s0s1(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(1 + HANDSHAKE_SIZE);
        buffer.write_u8(self.version)?;
        buffer.write_u32_be(self.s1_timestamp)?;
        buffer.write_u32_be(0)?;
        buffer.write_bytes(&self.s1_random)?;
        Ok(buffer.into_vec())
    }

    /// Encode S2
    pub fn encode_s2(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.s2_timestamp)?;
        buffer.write_u32_be(self.s2_timestamp2)?;
        buffer.write_bytes(&self.s2_random_echo)?;
        Ok(buffer.into_vec())
    }

    /// Check that C2 echoes S1
    pub fn validate_c2(&self, c2: &[u8]) -> Result<()> {
        if c2.len() != HANDSHAKE_SIZE {
            return Err(Error::handshake(format!("C2 is {} bytes", c2.len())));
        }
        let mut buffer = ByteBuffer::from_slice(c2);
        let timestamp = buffer.read_u32_be()?;
        buffer.skip(4)?;
        let random = buffer.read_bytes(HANDSHAKE_RANDOM_SIZE)?;
        if timestamp != self.s1_timestamp || random != self.s1_random {
            return Err(Error::handshake("C2 does not echo S1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s0s1_parse_and_c2() {
        let c0c1 = C0C1::create_client(10);
        let server = S0S1S2::generate(&c0c1, 500);
        let s0s1 = S0S1::parse(&server.encode_s0s1().unwrap()).unwrap();
        assert_eq!(s0s1.timestamp, 500);
        assert_eq!(s0s1.random_data, server.s1_random);

        let c2 = s0s1.create_c2(42).unwrap();
        assert_eq!(c2.len(), HANDSHAKE_SIZE);
        assert_eq!(&c2[4..8], &42u32.to_be_bytes());
        server.validate_c2(&c2).unwrap();
    }

    #[test]
    fn test_s0s1_rejects_short_or_wrong_version() {
        let c0c1 = C0C1::create_client(10);
        let mut bytes = S0S1S2::generate(&c0c1, 1).encode_s0s1().unwrap();
        assert!(S0S1::parse(&bytes[..1536]).is_err());
        bytes[0] = 0x06;
        assert!(S0S1::parse(&bytes).is_err());
    }

    #[test]
    fn test_s2_must_echo_c1() {
        let c0c1 = C0C1::create_client(10);
        let server = S0S1S2::generate(&c0c1, 1);
        let s2 = server.encode_s2().unwrap();
        validate_s2(&s2, &c0c1).unwrap();

        let mut tampered = s2.clone();
        tampered[100] ^= 0xFF;
        assert!(validate_s2(&tampered, &c0c1).is_err());

        let mut wrong_epoch = s2.clone();
        wrong_epoch[3] ^= 0x01;
        assert!(validate_s2(&wrong_epoch, &c0c1).is_err());

        assert!(validate_s2(&s2[..1535], &c0c1).is_err());
    }
}
