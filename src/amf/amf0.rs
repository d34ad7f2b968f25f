use crate::amf::{Amf0Decoder, Amf0Encoder};
use crate::{ByteBuffer, Result};

/// AMF0 values carried in command and data payloads
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),                          // 0x00
    Boolean(bool),                        // 0x01
    String(String),                       // 0x02, or 0x0C when longer than 65535 bytes
    Object(Vec<(String, Amf0Value)>),     // 0x03, property order is preserved
    Null,                                 // 0x05
    Undefined,                            // 0x06
    /// ECMA or strict array; recognized on the wire but contents are not kept
    Array,
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const LONG_STRING: u8 = 0x0C;
}

impl Amf0Value {
    /// Build a string value
    pub fn string(value: impl Into<String>) -> Self {
        Amf0Value::String(value.into())
    }

    /// Build an object from name/value pairs, keeping their order
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Amf0Value)>,
        K: Into<String>,
    {
        Amf0Value::Object(
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object properties
    pub fn as_object(&self) -> Option<&[(String, Amf0Value)]> {
        match self {
            Amf0Value::Object(properties) => Some(properties.as_slice()),
            _ => None,
        }
    }

    /// Get the first property with the given name
    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object()
            .and_then(|props| props.iter().find(|(name, _)| name == key))
            .map(|(_, value)| value)
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}

/// Encode a sequence of values back to back
pub fn encode_values(values: &[Amf0Value]) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    for value in values {
        encoder.encode(value)?;
    }
    Ok(encoder.into_bytes())
}

/// Decode every value in a flat buffer, left to right
pub fn decode_values(bytes: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::from_slice(bytes);
    let mut decoder = Amf0Decoder::new(&mut buffer);
    let mut values = Vec::new();
    while decoder.has_remaining() {
        values.push(decoder.decode()?);
    }
    Ok(values)
}
