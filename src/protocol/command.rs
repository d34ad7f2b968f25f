use crate::{Error, Result};
use crate::amf::{Amf0Value, Amf0Encoder, Amf0Decoder};
use crate::protocol::constants::*;
use crate::protocol::packet::RtmpPacket;
use crate::ByteBuffer;

#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Option<Amf0Value>,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: None,
            arguments: Vec::new(),
        }
    }

    /// Create connect command.
    ///
    /// Codec flags are only advertised for the media kinds that are configured,
    /// so an audio-only publisher sends `audioCodecs` and omits `videoCodecs`.
    pub fn connect(
        transaction_id: u32,
        app: &str,
        tc_url: &str,
        audio_codecs: Option<u32>,
        video_codecs: Option<u32>,
    ) -> Self {
        let mut cmd = RtmpCommand::new("connect", transaction_id as f64);

        let mut props = vec![
            ("app".to_string(), Amf0Value::string(app)),
            ("tcUrl".to_string(), Amf0Value::string(tc_url)),
        ];
        if let Some(flags) = audio_codecs {
            props.push(("audioCodecs".to_string(), Amf0Value::Number(flags as f64)));
        }
        if let Some(flags) = video_codecs {
            props.push(("videoCodecs".to_string(), Amf0Value::Number(flags as f64)));
        }

        cmd.command_object = Some(Amf0Value::Object(props));
        cmd
    }

    /// Create releaseStream command
    pub fn release_stream(transaction_id: u32, stream_name: &str) -> Self {
        Self::with_stream_name("releaseStream", transaction_id, stream_name)
    }

    /// Create FCPublish command
    pub fn fc_publish(transaction_id: u32, stream_name: &str) -> Self {
        Self::with_stream_name("FCPublish", transaction_id, stream_name)
    }

    fn with_stream_name(name: &str, transaction_id: u32, stream_name: &str) -> Self {
        let mut cmd = RtmpCommand::new(name, transaction_id as f64);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::string(stream_name));
        cmd
    }

    /// Create createStream command
    pub fn create_stream(transaction_id: u32) -> Self {
        let mut cmd = RtmpCommand::new("createStream", transaction_id as f64);
        cmd.command_object = Some(Amf0Value::Null);
        cmd
    }

    /// Create publish command
    pub fn publish(stream_name: &str, publish_type: &str) -> Self {
        let mut cmd = RtmpCommand::new("publish", 0.0);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::string(stream_name));
        cmd.arguments.push(Amf0Value::string(publish_type));
        cmd
    }

    /// Create unpublish command, sent as `publish` with a false flag
    pub fn unpublish() -> Self {
        let mut cmd = RtmpCommand::new("publish", 0.0);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::Boolean(false));
        cmd
    }

    /// Create closeStream command
    pub fn close_stream() -> Self {
        let mut cmd = RtmpCommand::new("closeStream", 0.0);
        cmd.command_object = Some(Amf0Value::Null);
        cmd
    }

    /// Create result response
    pub fn result(transaction_id: f64, result: Amf0Value) -> Self {
        let mut cmd = RtmpCommand::new("_result", transaction_id);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(result);
        cmd
    }

    /// Create error response
    pub fn error(transaction_id: f64, error_obj: Amf0Value) -> Self {
        let mut cmd = RtmpCommand::new("_error", transaction_id);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(error_obj);
        cmd
    }

    /// Create onStatus response
    pub fn on_status(level: &str, code: &str, description: &str) -> Self {
        let mut cmd = RtmpCommand::new("onStatus", 0.0);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::object([
            ("level", Amf0Value::string(level)),
            ("code", Amf0Value::string(code)),
            ("description", Amf0Value::string(description)),
        ]));
        cmd
    }

    /// Last Number among the arguments; createStream's `_result` carries the stream ID there
    pub fn last_number(&self) -> Option<f64> {
        self.arguments.iter().rev().find_map(|v| v.as_number())
    }

    /// Human readable reason from an `_error` or `onStatus` info object
    pub fn description(&self) -> String {
        self.arguments
            .iter()
            .find_map(|arg| {
                arg.get_property("description")
                    .or_else(|| arg.get_property("code"))
                    .and_then(|v| v.as_string())
            })
            .unwrap_or("no description")
            .to_string()
    }

    /// Encode command to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();

        // Encode command name
        encoder.encode(&Amf0Value::String(self.name.clone()))?;

        // Encode transaction ID
        encoder.encode(&Amf0Value::Number(self.transaction_id))?;

        // Encode command object
        if let Some(ref obj) = self.command_object {
            encoder.encode(obj)?;
        } else {
            encoder.encode(&Amf0Value::Null)?;
        }

        // Encode arguments
        for arg in &self.arguments {
            encoder.encode(arg)?;
        }

        Ok(encoder.into_bytes())
    }

    /// Wrap the encoded command in a type 20 message
    pub fn to_packet(&self, message_stream_id: u32) -> Result<RtmpPacket> {
        Ok(RtmpPacket::with_payload(MSG_TYPE_COMMAND_AMF0, 0, message_stream_id, self.encode()?))
    }

    /// Decode command from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_slice(data);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        // Decode command name
        let name_val = decoder.decode()?;
        let name = name_val.as_string()
            .ok_or_else(|| Error::amf_decode("Command name must be string"))?
            .to_string();

        // Decode transaction ID
        let tid_val = decoder.decode()?;
        let transaction_id = tid_val.as_number()
            .ok_or_else(|| Error::amf_decode("Transaction ID must be number"))?;

        // Decode command object
        let command_object = if decoder.has_remaining() {
            Some(decoder.decode()?)
        } else {
            None
        };

        // Decode remaining arguments
        let mut arguments = Vec::new();
        while decoder.has_remaining() {
            arguments.push(decoder.decode()?);
        }

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments,
        })
    }
}
