// Scripted ingest server for integration tests
//
// Accepts one connection on 127.0.0.1:0, completes the handshake, answers the
// publish negotiation and records every message the client sends until the
// client closes its side.

#![allow(dead_code)]

use rtmp_publisher::{
    Amf0Value, ChunkReader, ChunkWriter, PeerBandwidthLimit, RtmpCommand, RtmpMessage, RtmpPacket,
    UserControlEvent, C0C1, HANDSHAKE_SIZE, S0S1S2,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use std::time::Duration;

pub const SERVER_CHUNK_SIZE: u32 = 4096;
pub const SERVER_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const PING_TIMESTAMP: u32 = 1234;

/// How the server answers
#[derive(Debug, Clone)]
pub struct ServerScript {
    pub reject_connect: bool,
    pub reject_publish: bool,

    /// Answer FCPublish with `onFCPublish`
    pub answer_fc_publish: bool,

    /// Send a ping once publishing starts
    pub ping_after_publish: bool,

    /// Send buffer-empty, SWF verification and an odd peer bandwidth once publishing starts
    pub unmodelled_control_after_publish: bool,

    /// Drop the connection once the client has sent its chunk size, the last negotiation message
    pub disconnect_after_negotiation: bool,

    /// Stop reading from the socket after answering publish
    pub stall_after_publish: bool,

    pub stream_id: u32,
}

impl Default for ServerScript {
    fn default() -> Self {
        ServerScript {
            reject_connect: false,
            reject_publish: false,
            answer_fc_publish: false,
            ping_after_publish: false,
            unmodelled_control_after_publish: false,
            disconnect_after_negotiation: false,
            stall_after_publish: false,
            stream_id: 1,
        }
    }
}

/// One message as the server saw it
#[derive(Debug)]
pub struct Received {
    pub cs_id: u32,
    pub packet: RtmpPacket,
    pub message: RtmpMessage,
}

impl Received {
    pub fn command_name(&self) -> Option<&str> {
        match &self.message {
            RtmpMessage::Command(command)
            | RtmpMessage::Result(command)
            | RtmpMessage::Error(command)
            | RtmpMessage::OnStatus(command) => Some(command.name.as_str()),
            _ => None,
        }
    }

    pub fn command(&self) -> Option<&RtmpCommand> {
        match &self.message {
            RtmpMessage::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn is_unpublish(&self) -> bool {
        self.command().is_some_and(|command| {
            command.name == "publish" && command.arguments.first() == Some(&Amf0Value::Boolean(false))
        })
    }
}

pub struct FakeServer {
    pub url: String,
    handle: JoinHandle<Vec<Received>>,
}

impl FakeServer {
    /// Everything the client sent, available once it has closed the connection
    pub async fn received(self) -> Vec<Received> {
        self.handle.await.expect("fake server task panicked")
    }
}

pub async fn start_server(script: ServerScript) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        serve(socket, script).await
    });

    FakeServer {
        url: format!("rtmp://127.0.0.1:{}/live", port),
        handle,
    }
}

async fn serve(socket: TcpStream, script: ServerScript) -> Vec<Received> {
    let (mut read, mut write) = socket.into_split();

    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
    read.read_exact(&mut c0c1).await.expect("C0+C1");
    let c0c1 = C0C1::parse(&c0c1).expect("valid C0+C1");
    let s0s1s2 = S0S1S2::generate(&c0c1, 0);
    write.write_all(&s0s1s2.encode_s0s1().unwrap()).await.unwrap();
    write.write_all(&s0s1s2.encode_s2().unwrap()).await.unwrap();

    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    read.read_exact(&mut c2).await.expect("C2");
    s0s1s2.validate_c2(&c2).expect("C2 echoes S1");

    let mut reader = ChunkReader::new();
    let mut writer = ChunkWriter::new();
    let mut received = Vec::new();
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = read.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return received;
        }
        buffer.extend_from_slice(&chunk[..n]);

        let parsed = reader.try_parse(&buffer).expect("client sends valid chunks");
        buffer.drain(..parsed.consumed);

        for (packet, cs_id) in parsed.packets.into_iter().zip(parsed.chunk_stream_ids) {
            let message = RtmpMessage::from_packet(&packet).expect("client sends valid messages");
            let entry = Received { cs_id, packet, message };
            let hang_up = script.disconnect_after_negotiation
                && matches!(entry.message, RtmpMessage::SetChunkSize(_));
            let stall = script.stall_after_publish
                && entry.command_name() == Some("publish")
                && !entry.is_unpublish();
            respond(&entry, &script, &mut writer, &mut write).await;
            received.push(entry);
            if hang_up {
                return received;
            }
            if stall {
                // Keep the socket open without reading so the client's buffers fill
                tokio::time::sleep(Duration::from_secs(60)).await;
                return received;
            }
        }
    }
}

async fn respond(entry: &Received, script: &ServerScript, writer: &mut ChunkWriter, write: &mut OwnedWriteHalf) {
    let Some(command) = entry.command() else {
        return;
    };
    let tid = command.transaction_id;

    match command.name.as_str() {
        "connect" => {
            let window = RtmpMessage::WindowAckSize(SERVER_WINDOW_ACK_SIZE).to_packet(0).unwrap();
            let bandwidth = RtmpMessage::SetPeerBandwidth {
                window_size: SERVER_WINDOW_ACK_SIZE,
                limit: PeerBandwidthLimit::Dynamic,
            }
            .to_packet(0)
            .unwrap();
            let chunk_size = RtmpMessage::SetChunkSize(SERVER_CHUNK_SIZE).to_packet(0).unwrap();
            send(writer, write, 2, &window).await;
            send(writer, write, 2, &bandwidth).await;
            send(writer, write, 2, &chunk_size).await;
            writer.set_chunk_size(SERVER_CHUNK_SIZE);

            let response = if script.reject_connect {
                RtmpCommand::error(
                    tid,
                    Amf0Value::object([
                        ("level", Amf0Value::string("error")),
                        ("code", Amf0Value::string("NetConnection.Connect.Rejected")),
                        ("description", Amf0Value::string("Application not found")),
                    ]),
                )
            } else {
                RtmpCommand::result(
                    tid,
                    Amf0Value::object([
                        ("level", Amf0Value::string("status")),
                        ("code", Amf0Value::string("NetConnection.Connect.Success")),
                    ]),
                )
            };
            send(writer, write, 3, &response.to_packet(0).unwrap()).await;
        }
        "FCPublish" if script.answer_fc_publish => {
            let mut answer = RtmpCommand::new("onFCPublish", 0.0);
            answer.command_object = Some(Amf0Value::Null);
            send(writer, write, 3, &answer.to_packet(0).unwrap()).await;
        }
        "createStream" => {
            let result = RtmpCommand::result(tid, Amf0Value::Number(script.stream_id as f64));
            send(writer, write, 3, &result.to_packet(0).unwrap()).await;
        }
        "publish" if !entry.is_unpublish() => {
            let msid = script.stream_id;
            let status = if script.reject_publish {
                RtmpCommand::on_status("error", "NetStream.Publish.BadName", "Stream already publishing")
            } else {
                let begin = RtmpMessage::UserControl(UserControlEvent::StreamBegin { stream_id: msid });
                send(writer, write, 2, &begin.to_packet(0).unwrap()).await;
                RtmpCommand::on_status("status", "NetStream.Publish.Start", "Publishing")
            };
            send(writer, write, 5, &status.to_packet(msid).unwrap()).await;

            if script.unmodelled_control_after_publish && !script.reject_publish {
                let buffer_empty = RtmpMessage::UserControl(UserControlEvent::Unknown {
                    event_type: 31,
                    data: msid.to_be_bytes().to_vec(),
                });
                let swf_verify = RtmpMessage::UserControl(UserControlEvent::Unknown { event_type: 26, data: vec![] });
                let bandwidth = RtmpPacket::with_payload(6, 0, 0, vec![0, 0x26, 0x25, 0xA0, 7]);
                send(writer, write, 2, &buffer_empty.to_packet(0).unwrap()).await;
                send(writer, write, 2, &swf_verify.to_packet(0).unwrap()).await;
                send(writer, write, 2, &bandwidth).await;
            }

            if script.ping_after_publish && !script.reject_publish {
                let ping = RtmpMessage::UserControl(UserControlEvent::PingRequest { timestamp: PING_TIMESTAMP });
                send(writer, write, 2, &ping.to_packet(0).unwrap()).await;
            }
        }
        _ => {}
    }
}

async fn send(writer: &ChunkWriter, write: &mut OwnedWriteHalf, cs_id: u32, packet: &RtmpPacket) {
    writer.write_packet(cs_id, packet, write).await.expect("write to client");
}

/// Annex B key frame with SPS, PPS and one IDR slice
pub fn key_frame() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xC0, 0x1F, 0xDA, 0x01,
        0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80,
        0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, 0xA0,
    ]
}

/// Annex B inter frame with one non-IDR slice
pub fn inter_frame() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x02, 0x04]
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
