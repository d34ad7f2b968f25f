// Publish a raw H.264 file
//
// Reads an Annex B elementary stream, splits it into access units and pushes
// them to an ingest server at a fixed frame rate.
//
// Usage:
//   cargo run --example publish_file -- rtmp://localhost/live mystream input.h264 [fps] [width] [height]

use rtmp_publisher::{
    find_nal_units, MediaSample, PublishConfig, PublishEvent, Result, RtmpPublisher, VideoProfile,
    NAL_TYPE_AUD, NAL_TYPE_IDR, NAL_TYPE_SLICE, TICKS_PER_SECOND,
};
use std::env;
use std::time::Duration;
use log::{error, info};

const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Split an elementary stream into access units, each re-framed as Annex B.
///
/// A new unit starts at an access unit delimiter or when a slice follows a
/// slice already in the current unit. Parameter sets stay with the next slice.
fn split_access_units(stream: &[u8]) -> Vec<(Vec<u8>, bool)> {
    let mut units = Vec::new();
    let mut current = Vec::new();
    let mut has_slice = false;
    let mut is_keyframe = false;

    for nal in find_nal_units(stream) {
        let is_slice = nal.nal_type == NAL_TYPE_SLICE || nal.nal_type == NAL_TYPE_IDR;
        let starts_unit = nal.nal_type == NAL_TYPE_AUD || (is_slice && has_slice);
        if starts_unit && has_slice {
            units.push((std::mem::take(&mut current), is_keyframe));
            has_slice = false;
            is_keyframe = false;
        }
        if nal.nal_type == NAL_TYPE_AUD {
            continue;
        }

        current.extend_from_slice(&START_CODE);
        current.extend_from_slice(nal.data());
        has_slice |= is_slice;
        is_keyframe |= nal.is_keyframe();
    }

    if has_slice {
        units.push((current, is_keyframe));
    }
    units
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <url> <stream_name> <file.h264> [fps] [width] [height]", args[0]);
        eprintln!("Example:");
        eprintln!("  {} rtmp://localhost/live mystream input.h264 30 1280 720", args[0]);
        std::process::exit(1);
    }

    let url = &args[1];
    let stream_name = &args[2];
    let path = &args[3];
    let fps: u32 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(30);
    let width: u32 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(1280);
    let height: u32 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(720);

    let stream = tokio::fs::read(path).await?;
    let units = split_access_units(&stream);
    info!("Read {} access units from {}", units.len(), path);

    let config = PublishConfig::builder(url)
        .stream_name(stream_name.as_str())
        .video(VideoProfile::new(width, height, fps, 1, 2_500_000))
        .chunk_size(4096)
        .build()?;

    let publisher = RtmpPublisher::connect(config).await?;
    let mut events = publisher.events().await;
    publisher.on_clock_start(0).await;

    let frame_ticks = TICKS_PER_SECOND / fps.max(1) as i64;
    let mut interval = tokio::time::interval(Duration::from_nanos(1_000_000_000 / fps.max(1) as u64));

    for (index, (data, is_keyframe)) in units.into_iter().enumerate() {
        interval.tick().await;
        let sample = MediaSample::new(index as i64 * frame_ticks, data).keyframe(is_keyframe);
        if let Err(e) = publisher.push_video(sample).await {
            error!("Publishing stopped: {}", e);
            break;
        }
    }

    publisher.close().await?;

    if let Some(ref mut events) = events {
        match events.recv().await {
            Some(PublishEvent::Closed { last_video_timestamp, .. }) => {
                info!("Closed; resume from video timestamp {}", last_video_timestamp);
            }
            Some(PublishEvent::Failed { code, message }) => {
                error!("Failed ({}): {}", code, message);
            }
            None => {}
        }
    }

    Ok(())
}
