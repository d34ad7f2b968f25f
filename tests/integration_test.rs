// Integration tests for the publisher
//
// Every test runs the real client against the scripted server in common/
// over a loopback socket.

mod common;

use common::*;
use rtmp_publisher::{
    millis_to_ticks, Amf0Value, AudioProfile, ConnectionState, Error, MediaKind, MediaSample,
    PublishConfig, PublishEvent, RtmpMessage, RtmpPublisher, ServerVariant, UserControlEvent, VideoProfile,
};
use std::time::Duration;

fn config(url: &str) -> PublishConfig {
    PublishConfig::builder(url)
        .stream_name("test-stream")
        .video(VideoProfile::new(1280, 720, 30, 1, 2_500_000))
        .audio(AudioProfile::new(44100, 2, 128_000))
        .response_timeout(Duration::from_secs(5))
        .build()
        .expect("valid config")
}

fn command_names(received: &[Received]) -> Vec<&str> {
    received.iter().filter_map(|r| r.command_name()).collect()
}

fn media(received: &[Received], video: bool) -> Vec<&Received> {
    received
        .iter()
        .filter(|r| if video { r.packet.is_video() } else { r.packet.is_audio() })
        .collect()
}

#[tokio::test]
async fn test_publish_session_end_to_end() {
    init_logging();
    let server = start_server(ServerScript::default()).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.expect("connect");
    assert_eq!(publisher.state().await, ConnectionState::Running);
    let mut events = publisher.events().await.expect("event receiver");
    assert!(publisher.events().await.is_none());

    {
        let session = publisher.session();
        let session = session.lock().await;
        assert_eq!(session.message_stream_id, 1);
        assert_eq!(session.window_ack_size, SERVER_WINDOW_ACK_SIZE);
        assert_eq!(session.server_chunk_size(), SERVER_CHUNK_SIZE);
        assert_eq!(session.client_chunk_size(), 4096);
    }

    publisher.on_clock_start(0).await;
    publisher
        .push_video(MediaSample::new(0, key_frame()).keyframe(true))
        .await
        .unwrap();
    publisher
        .push_audio(MediaSample::new(millis_to_ticks(10), vec![0x21, 0x10, 0x04]))
        .await
        .unwrap();
    publisher
        .push_video(MediaSample::new(millis_to_ticks(33), inter_frame()))
        .await
        .unwrap();

    publisher.close().await.unwrap();
    publisher.close().await.unwrap();
    assert_eq!(publisher.state().await, ConnectionState::Closed);

    match events.recv().await {
        Some(PublishEvent::Closed { endpoint, stream_name, last_video_timestamp, last_audio_timestamp }) => {
            assert!(endpoint.starts_with("rtmp://127.0.0.1:"));
            assert_eq!(stream_name, "test-stream");
            assert_eq!(last_video_timestamp, millis_to_ticks(33));
            assert_eq!(last_audio_timestamp, millis_to_ticks(10));
        }
        other => panic!("expected Closed, got {:?}", other),
    }

    let received = server.received().await;
    assert_eq!(
        command_names(&received),
        vec!["connect", "releaseStream", "FCPublish", "createStream", "publish", "publish", "closeStream"]
    );
    assert!(received.iter().any(|r| r.is_unpublish()));

    let video = media(&received, true);
    assert_eq!(video.len(), 3);
    assert_eq!(video[0].packet.payload[..2], [0x17, 0x00]);
    assert_eq!(video[1].packet.payload[..5], [0x17, 0x01, 0x00, 0x00, 0x00]);
    assert_eq!(video[0].packet.timestamp(), 0);
    assert_eq!(video[1].packet.timestamp(), 0);
    assert_eq!(video[2].packet.payload[..2], [0x27, 0x01]);
    assert_eq!(video[2].packet.timestamp(), 33);

    let audio = media(&received, false);
    assert_eq!(audio.len(), 2);
    assert_eq!(audio[0].packet.payload, vec![0xAF, 0x00, 0x42, 0x00]);
    assert_eq!(audio[1].packet.payload, vec![0xAF, 0x01, 0x21, 0x10, 0x04]);
    assert_eq!(audio[1].packet.timestamp(), 10);
}

#[tokio::test]
async fn test_chunk_stream_layout() {
    init_logging();
    let server = start_server(ServerScript { stream_id: 7, ..Default::default() }).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.unwrap();
    publisher.on_clock_start(0).await;
    publisher.push_video(MediaSample::new(0, key_frame()).keyframe(true)).await.unwrap();
    publisher.push_audio(MediaSample::new(0, vec![0x21])).await.unwrap();
    publisher.close().await.unwrap();

    let received = server.received().await;
    let cs_of = |name: &str| {
        received
            .iter()
            .find(|r| r.command_name() == Some(name) && !r.is_unpublish())
            .map(|r| r.cs_id)
    };

    assert_eq!(cs_of("connect"), Some(3));
    assert_eq!(cs_of("releaseStream"), Some(4));
    assert_eq!(cs_of("FCPublish"), Some(4));
    assert_eq!(cs_of("createStream"), Some(4));
    assert_eq!(cs_of("publish"), Some(5));
    assert_eq!(cs_of("closeStream"), Some(5));

    let data = received.iter().find(|r| r.packet.is_data()).unwrap();
    assert_eq!(data.cs_id, 6);
    assert_eq!(data.packet.message_stream_id(), 7);

    let chunk_size = received
        .iter()
        .find(|r| matches!(r.message, RtmpMessage::SetChunkSize(_)))
        .unwrap();
    assert_eq!(chunk_size.cs_id, 7);
    assert_eq!(chunk_size.message, RtmpMessage::SetChunkSize(4096));

    assert!(media(&received, true).iter().all(|r| r.cs_id == 8 && r.packet.message_stream_id() == 7));
    assert!(media(&received, false).iter().all(|r| r.cs_id == 9 && r.packet.message_stream_id() == 7));
}

#[tokio::test]
async fn test_connect_and_metadata_describe_configured_media() {
    init_logging();
    let server = start_server(ServerScript::default()).await;
    let url = server.url.clone();

    let audio_only = PublishConfig::builder(&url)
        .stream_name("radio")
        .audio(AudioProfile::new(48000, 2, 96_000))
        .build()
        .unwrap();
    let publisher = RtmpPublisher::connect(audio_only).await.unwrap();
    publisher.on_clock_start(0).await;

    assert!(matches!(
        publisher.push_video(MediaSample::new(0, key_frame())).await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(publisher.state().await, ConnectionState::Running);
    publisher.close().await.unwrap();

    let received = server.received().await;
    let connect = received.iter().find(|r| r.command_name() == Some("connect")).unwrap();
    let object = connect.command().unwrap().command_object.as_ref().unwrap();
    assert_eq!(object.get_property("app"), Some(&Amf0Value::string("live")));
    assert_eq!(object.get_property("tcUrl"), Some(&Amf0Value::string(url.as_str())));
    assert_eq!(object.get_property("audioCodecs"), Some(&Amf0Value::Number(1024.0)));
    assert_eq!(object.get_property("videoCodecs"), None);

    let data = received
        .iter()
        .find_map(|r| match &r.message {
            RtmpMessage::Data(data) => Some(data),
            _ => None,
        })
        .unwrap();
    assert_eq!(data.data_type, "@setDataFrame");
    assert_eq!(data.values[0], Amf0Value::string("onMetaData"));
    let metadata = &data.values[1];
    assert_eq!(metadata.get_property("audiosamplerate"), Some(&Amf0Value::Number(48000.0)));
    assert_eq!(metadata.get_property("audiodatarate"), Some(&Amf0Value::Number(96.0)));
    assert_eq!(metadata.get_property("videocodecid"), None);
    assert_eq!(metadata.get_property("width"), None);
}

#[tokio::test]
async fn test_connect_rejected() {
    init_logging();
    let server = start_server(ServerScript { reject_connect: true, ..Default::default() }).await;

    match RtmpPublisher::connect(config(&server.url)).await {
        Err(Error::Rejected { command, description }) => {
            assert_eq!(command, "connect");
            assert_eq!(description, "Application not found");
        }
        Err(other) => panic!("expected rejection, got {}", other),
        Ok(_) => panic!("expected rejection"),
    }

    let received = server.received().await;
    assert_eq!(command_names(&received), vec!["connect"]);
}

#[tokio::test]
async fn test_publish_rejected() {
    init_logging();
    let server = start_server(ServerScript { reject_publish: true, ..Default::default() }).await;

    let result = RtmpPublisher::connect(config(&server.url)).await;
    assert!(matches!(result, Err(Error::Rejected { ref command, .. }) if command == "publish"));

    let received = server.received().await;
    assert!(received.iter().all(|r| !r.packet.is_data()));
}

#[tokio::test]
async fn test_sequential_variant_with_fc_publish_answer() {
    init_logging();
    let server = start_server(ServerScript { answer_fc_publish: true, ..Default::default() }).await;

    let config = PublishConfig::builder(&server.url)
        .stream_name("seq")
        .server_variant(ServerVariant::Sequential)
        .video(VideoProfile::new(640, 360, 25, 1, 800_000))
        .build()
        .unwrap();
    let publisher = RtmpPublisher::connect(config).await.unwrap();
    assert_eq!(publisher.state().await, ConnectionState::Running);
    publisher.close().await.unwrap();

    let received = server.received().await;
    assert_eq!(
        &command_names(&received)[..5],
        &["connect", "releaseStream", "FCPublish", "createStream", "publish"]
    );
}

#[tokio::test]
async fn test_sequential_variant_without_fc_publish_answer() {
    init_logging();
    let server = start_server(ServerScript::default()).await;

    let config = PublishConfig::builder(&server.url)
        .server_variant(ServerVariant::Sequential)
        .video(VideoProfile::new(640, 360, 25, 1, 800_000))
        .response_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let stream_name = config.stream_name.clone();
    let publisher = RtmpPublisher::connect(config).await.unwrap();
    assert_eq!(publisher.stream_name(), stream_name);
    publisher.close().await.unwrap();

    let received = server.received().await;
    let publish = received.iter().find(|r| r.command_name() == Some("publish")).unwrap();
    assert_eq!(
        publish.command().unwrap().arguments,
        vec![Amf0Value::string(stream_name), Amf0Value::string("live")]
    );
}

#[tokio::test]
async fn test_ping_answered() {
    init_logging();
    let server = start_server(ServerScript { ping_after_publish: true, ..Default::default() }).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    publisher.close().await.unwrap();

    let received = server.received().await;
    let pong = received
        .iter()
        .find(|r| {
            r.message
                == RtmpMessage::UserControl(UserControlEvent::PingResponse { timestamp: PING_TIMESTAMP })
        })
        .expect("ping response");
    assert_eq!(pong.cs_id, 2);
}

#[tokio::test]
async fn test_samples_gated_by_clock_and_segment() {
    init_logging();
    let server = start_server(ServerScript::default()).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.unwrap();

    // Nothing goes out before the clock starts
    publisher.push_video(MediaSample::new(0, key_frame()).keyframe(true)).await.unwrap();

    publisher.on_clock_start(millis_to_ticks(1000)).await;
    publisher
        .push_video(MediaSample::new(millis_to_ticks(500), key_frame()).keyframe(true))
        .await
        .unwrap();
    publisher
        .push_video(MediaSample::new(millis_to_ticks(1000), key_frame()).keyframe(true))
        .await
        .unwrap();

    publisher.end_of_segment(MediaKind::Audio).await;
    publisher.push_audio(MediaSample::new(millis_to_ticks(1000), vec![0x21])).await.unwrap();
    publisher.close().await.unwrap();

    let received = server.received().await;
    let video = media(&received, true);
    assert_eq!(video.len(), 2);
    assert_eq!(video[0].packet.timestamp(), 1000);
    assert!(media(&received, false).is_empty());
}

#[tokio::test]
async fn test_gap_absorbed_and_resume_base() {
    init_logging();
    let server = start_server(ServerScript::default()).await;

    let config = PublishConfig::builder(&server.url)
        .video(VideoProfile::new(1280, 720, 30, 1, 2_500_000))
        .timestamp_bases(millis_to_ticks(5000), 0)
        .build()
        .unwrap();
    let publisher = RtmpPublisher::connect(config).await.unwrap();
    publisher.on_clock_start(0).await;

    publisher.push_video(MediaSample::new(0, key_frame()).keyframe(true)).await.unwrap();
    publisher.push_video(MediaSample::new(millis_to_ticks(33), inter_frame())).await.unwrap();
    publisher.tick(MediaKind::Video, millis_to_ticks(233)).await;
    publisher.push_video(MediaSample::new(millis_to_ticks(266), inter_frame())).await.unwrap();
    publisher.close().await.unwrap();

    let received = server.received().await;
    let timestamps: Vec<u32> = media(&received, true).iter().map(|r| r.packet.timestamp()).collect();

    // 5000 ms base plus one frame interval, then source deltas with the gap removed
    assert_eq!(timestamps, vec![5033, 5033, 5066, 5099]);
}

#[tokio::test]
async fn test_failure_reported_once() {
    init_logging();
    let server = start_server(ServerScript { disconnect_after_negotiation: true, ..Default::default() }).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.unwrap();
    let mut events = publisher.events().await.unwrap();

    match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
        Ok(Some(PublishEvent::Failed { code, .. })) => {
            // A reset surfaces as an I/O error, an orderly close as a connection error
            let io_code = Error::Io(std::io::Error::other("reset")).code();
            assert!(code == Error::connection("").code() || code == io_code);
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(publisher.state().await, ConnectionState::Failed);

    publisher.on_clock_start(0).await;
    assert!(publisher.push_audio(MediaSample::new(0, vec![0x21])).await.is_err());
    publisher.close().await.unwrap();
    drop(publisher);

    // Neither the later push error nor close produce a second event
    assert_eq!(events.recv().await, None);
    server.received().await;
}

#[tokio::test]
async fn test_unmodelled_control_messages_keep_session_running() {
    init_logging();
    let server = start_server(ServerScript { unmodelled_control_after_publish: true, ..Default::default() }).await;

    let publisher = RtmpPublisher::connect(config(&server.url)).await.unwrap();
    let mut events = publisher.events().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(publisher.state().await, ConnectionState::Running);

    publisher.on_clock_start(0).await;
    publisher.push_video(MediaSample::new(0, key_frame()).keyframe(true)).await.unwrap();
    publisher.close().await.unwrap();

    assert!(matches!(events.recv().await, Some(PublishEvent::Closed { .. })));
    let received = server.received().await;
    assert_eq!(media(&received, true).len(), 2);
    assert!(received.iter().any(|r| r.is_unpublish()));
}

#[tokio::test]
async fn test_stalled_server_does_not_block_close() {
    init_logging();
    let server = start_server(ServerScript { stall_after_publish: true, ..Default::default() }).await;

    let config = PublishConfig::builder(&server.url)
        .stream_name("test-stream")
        .video(VideoProfile::new(1280, 720, 30, 1, 2_500_000))
        .throttle(true)
        .send_queue_capacity(2)
        .response_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let publisher = RtmpPublisher::connect(config).await.unwrap();
    let mut events = publisher.events().await.unwrap();
    publisher.on_clock_start(0).await;
    publisher.push_video(MediaSample::new(0, key_frame()).keyframe(true)).await.unwrap();

    // Large frames fill the socket buffers, then the queue
    let mut frame = vec![0x00, 0x00, 0x00, 0x01, 0x41];
    frame.resize(256 * 1024, 0xAB);
    let frame_ticks = millis_to_ticks(33);
    let mut failure = None;
    for index in 1..400i64 {
        let sample = MediaSample::new(index * frame_ticks, frame.clone());
        let pushed = tokio::time::timeout(Duration::from_secs(5), publisher.push_video(sample))
            .await
            .expect("push returns once the queue limit passes");
        if let Err(err) = pushed {
            failure = Some(err);
            break;
        }
    }
    assert!(matches!(failure, Some(Error::Timeout(_))), "got {:?}", failure);

    tokio::time::timeout(Duration::from_secs(5), publisher.close())
        .await
        .expect("close returns against a stalled server")
        .unwrap();

    match events.recv().await {
        Some(PublishEvent::Failed { code, .. }) => assert_eq!(code, Error::timeout("").code()),
        other => panic!("expected Failed, got {:?}", other),
    }
    drop(server);
}
