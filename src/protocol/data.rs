use crate::{Error, Result};
use crate::amf::{Amf0Value, Amf0Encoder, Amf0Decoder};
use crate::protocol::constants::*;
use crate::protocol::packet::RtmpPacket;
use crate::ByteBuffer;

#[derive(Debug, Clone, PartialEq)]
pub struct RtmpData {
    pub data_type: String,
    pub values: Vec<Amf0Value>,
}

impl RtmpData {
    /// Create new data message
    pub fn new(data_type: impl Into<String>) -> Self {
        RtmpData {
            data_type: data_type.into(),
            values: Vec::new(),
        }
    }

    /// Create `@setDataFrame` carrying an `onMetaData` object
    pub fn set_data_frame(metadata: Amf0Value) -> Self {
        let mut data = RtmpData::new("@setDataFrame");
        data.values.push(Amf0Value::string("onMetaData"));
        data.values.push(metadata);
        data
    }

    /// Encode data message to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();

        // Encode data type
        encoder.encode(&Amf0Value::String(self.data_type.clone()))?;

        // Encode values
        for value in &self.values {
            encoder.encode(value)?;
        }

        Ok(encoder.into_bytes())
    }

    /// Wrap the encoded data in a type 18 message
    pub fn to_packet(&self, message_stream_id: u32) -> Result<RtmpPacket> {
        Ok(RtmpPacket::with_payload(MSG_TYPE_DATA_AMF0, 0, message_stream_id, self.encode()?))
    }

    /// Decode data message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_slice(data);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        // Decode data type
        let type_val = decoder.decode()?;
        let data_type = type_val.as_string()
            .ok_or_else(|| Error::amf_decode("Data type must be string"))?
            .to_string();

        // Decode remaining values
        let mut values = Vec::new();
        while decoder.has_remaining() {
            values.push(decoder.decode()?);
        }

        Ok(RtmpData {
            data_type,
            values,
        })
    }
}
