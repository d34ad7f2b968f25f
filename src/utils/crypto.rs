use rand::{Rng, rng};

/// Generate random bytes for handshake payloads
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a 32 digit upper-case hex name, used when no stream name is configured
pub fn generate_stream_name() -> String {
    generate_random_bytes(16)
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect()
}
