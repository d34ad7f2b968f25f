use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error};
use crate::Result;

/// Deepest object or array nesting accepted from the peer
pub const MAX_NESTING: usize = 64;

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
    depth: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer, depth: 0 }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::NUMBER => Ok(Amf0Value::Number(self.buffer.read_f64_be()?)),
            markers::BOOLEAN => Ok(Amf0Value::Boolean(self.buffer.read_u8()? != 0)),
            markers::STRING => {
                let len = self.buffer.read_u16_be()? as usize;
                self.read_utf8(len).map(Amf0Value::String)
            }
            markers::LONG_STRING => {
                let len = self.buffer.read_u32_be()? as usize;
                self.read_utf8(len).map(Amf0Value::String)
            }
            markers::OBJECT => self.nested(Self::decode_object),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.nested(Self::skip_ecma_array),
            markers::STRICT_ARRAY => self.nested(Self::skip_strict_array),
            markers::OBJECT_END => Err(Error::amf_decode("Object end marker outside of an object")),
            _ => Err(Error::amf_decode(format!("Unknown AMF0 marker: 0x{:02x}", marker))),
        }
    }

    fn nested(&mut self, decode: fn(&mut Self) -> Result<Amf0Value>) -> Result<Amf0Value> {
        if self.depth >= MAX_NESTING {
            return Err(Error::amf_decode(format!("Nesting deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let value = decode(self);
        self.depth -= 1;
        value
    }

    fn decode_object(&mut self) -> Result<Amf0Value> {
        let mut properties = Vec::new();
        while let Some(name) = self.read_property_name()? {
            let value = self.decode()?;
            properties.push((name, value));
        }
        Ok(Amf0Value::Object(properties))
    }

    // ECMA arrays carry an advisory count followed by named properties
    fn skip_ecma_array(&mut self) -> Result<Amf0Value> {
        let _count = self.buffer.read_u32_be()?;
        while self.read_property_name()?.is_some() {
            self.decode()?;
        }
        Ok(Amf0Value::Array)
    }

    fn skip_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.buffer.read_u32_be()?;
        for _ in 0..count {
            self.decode()?;
        }
        Ok(Amf0Value::Array)
    }

    /// Returns None once the empty name and end marker are reached
    fn read_property_name(&mut self) -> Result<Option<String>> {
        let name_len = self.buffer.read_u16_be()? as usize;
        if name_len == 0 {
            let marker = self.buffer.read_u8()?;
            if marker == markers::OBJECT_END {
                return Ok(None);
            }
            return Err(Error::amf_decode(format!(
                "Object value (marker 0x{:02x}) without a property name",
                marker
            )));
        }
        self.read_utf8(name_len).map(Some)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.buffer.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in string: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: Vec<u8>) -> Result<Amf0Value> {
        let mut buffer = ByteBuffer::new(bytes);
        Amf0Decoder::new(&mut buffer).decode()
    }

    #[test]
    fn test_object_value_without_name_fails() {
        // Object marker, empty name, then a Number instead of the end marker
        let mut bytes = vec![markers::OBJECT, 0x00, 0x00, markers::NUMBER];
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        let err = decode_one(bytes).unwrap_err();
        assert!(matches!(err, Error::AmfDecode(_)));
    }

    #[test]
    fn test_ecma_array_contents_are_skipped() {
        let mut bytes = vec![markers::ECMA_ARRAY, 0, 0, 0, 1, 0, 1, b'a', markers::BOOLEAN, 1, 0, 0, markers::OBJECT_END];
        bytes.push(markers::NULL);
        let mut buffer = ByteBuffer::new(bytes);
        let mut decoder = Amf0Decoder::new(&mut buffer);
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Array);
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Null);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn test_strict_array_contents_are_skipped() {
        let mut bytes = vec![markers::STRICT_ARRAY, 0, 0, 0, 2, markers::NULL, markers::BOOLEAN, 0];
        bytes.push(markers::UNDEFINED);
        let mut buffer = ByteBuffer::new(bytes);
        let mut decoder = Amf0Decoder::new(&mut buffer);
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Array);
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Undefined);
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        assert!(decode_one(vec![markers::NUMBER, 0x40]).is_err());
        assert!(decode_one(vec![markers::STRING, 0x00, 0x05, b'a']).is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut bytes = vec![markers::OBJECT];
        for _ in 0..10_000 {
            bytes.extend_from_slice(&[0x00, 0x01, b'a', markers::OBJECT]);
        }
        let err = decode_one(bytes).unwrap_err();
        assert!(matches!(err, Error::AmfDecode(_)));
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let mut bytes = vec![markers::OBJECT];
        for _ in 1..MAX_NESTING {
            bytes.extend_from_slice(&[0x00, 0x01, b'a', markers::OBJECT]);
        }
        for _ in 0..MAX_NESTING {
            bytes.extend_from_slice(&[0x00, 0x00, markers::OBJECT_END]);
        }
        let mut value = decode_one(bytes).unwrap();
        let mut levels = 1;
        while let Some(inner) = value.get_property("a").cloned() {
            value = inner;
            levels += 1;
        }
        assert_eq!(levels, MAX_NESTING);
    }

    #[test]
    fn test_deeply_nested_arrays_rejected() {
        let mut bytes = Vec::new();
        for _ in 0..10_000 {
            bytes.extend_from_slice(&[markers::STRICT_ARRAY, 0, 0, 0, 1]);
        }
        assert!(decode_one(bytes).is_err());
    }

    #[test]
    fn test_unknown_marker() {
        assert!(decode_one(vec![0x11]).is_err());
    }
}
