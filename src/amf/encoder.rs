use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error};
use crate::Result;

const MAX_SHORT_STRING: usize = u16::MAX as usize;

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(256),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => {
                self.buffer.write_u8(markers::NUMBER)?;
                self.buffer.write_f64_be(*n)?;
            }
            Amf0Value::Boolean(b) => {
                self.buffer.write_u8(markers::BOOLEAN)?;
                self.buffer.write_u8(u8::from(*b))?;
            }
            Amf0Value::String(s) => self.encode_string(s)?,
            Amf0Value::Object(properties) => self.encode_object(properties)?,
            Amf0Value::Null => self.buffer.write_u8(markers::NULL)?,
            Amf0Value::Undefined => self.buffer.write_u8(markers::UNDEFINED)?,
            Amf0Value::Array => {
                self.buffer.write_u8(markers::STRICT_ARRAY)?;
                self.buffer.write_u32_be(0)?;
            }
        }
        Ok(())
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_SHORT_STRING {
            let len = u32::try_from(bytes.len())
                .map_err(|_| Error::amf_encode("String exceeds 4 GiB"))?;
            self.buffer.write_u8(markers::LONG_STRING)?;
            self.buffer.write_u32_be(len)?;
        } else {
            self.buffer.write_u8(markers::STRING)?;
            self.buffer.write_u16_be(bytes.len() as u16)?;
        }
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    fn encode_object(&mut self, properties: &[(String, Amf0Value)]) -> Result<()> {
        self.buffer.write_u8(markers::OBJECT)?;
        for (name, value) in properties {
            self.write_property_name(name)?;
            self.encode(value)?;
        }
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    /// Property names are written without a type marker
    fn write_property_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Err(Error::amf_encode("Object property name must not be empty"));
        }
        if bytes.len() > MAX_SHORT_STRING {
            return Err(Error::amf_encode(format!("Property name too long: {} bytes", bytes.len())));
        }
        self.buffer.write_u16_be(bytes.len() as u16)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}
