use crate::utils::{ticks_to_rtmp_timestamp, TICKS_PER_SECOND};
use log::{debug, trace};

/// Media kind a sample or marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Timestamps for one accepted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTimestamps {
    /// Derived presentation time in ticks
    pub pts: i64,
    /// Derived decode time in ticks
    pub dts: i64,
    /// Wire timestamp of the message (DTS in milliseconds, modulo 2^32)
    pub timestamp: u32,
    /// Wire PTS minus wire DTS
    pub composition_offset: u32,
    /// First sample of its kind since the state was created or reset
    pub is_first: bool,
}

/// Ticks between video frames at `numerator / denominator` frames per second
pub fn video_sample_interval(numerator: u32, denominator: u32) -> i64 {
    if numerator == 0 || denominator == 0 {
        return 0;
    }
    let fps = numerator as f64 / denominator as f64;
    (TICKS_PER_SECOND as f64 / fps).round() as i64
}

/// Ticks spanned by 1000 audio samples at `sample_rate`
pub fn audio_sample_interval(sample_rate: u32) -> i64 {
    if sample_rate == 0 {
        return 0;
    }
    (TICKS_PER_SECOND as f64 / (sample_rate as f64 / 1000.0)).round() as i64
}

/// Per kind timing state
#[derive(Debug, Clone)]
pub struct SampleTimingState {
    kind: MediaKind,
    start_pts: i64,
    last_pts: i64,
    last_dts: i64,
    last_original_pts: i64,
    last_original_dts: i64,
    gap_length: i64,
    sample_interval: i64,
    timestamp_base: i64,
    end_of_stream: bool,
}

impl SampleTimingState {
    /// `timestamp_base` is the last DTS of a previous publish, 0 for a fresh one
    pub fn new(kind: MediaKind, sample_interval: i64, timestamp_base: i64) -> Self {
        SampleTimingState {
            kind,
            start_pts: -1,
            last_pts: 0,
            last_dts: 0,
            last_original_pts: 0,
            last_original_dts: 0,
            gap_length: 0,
            sample_interval,
            timestamp_base,
            end_of_stream: false,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn has_started(&self) -> bool {
        self.start_pts >= 0
    }

    pub fn start_pts(&self) -> Option<i64> {
        self.has_started().then_some(self.start_pts)
    }

    pub fn last_pts(&self) -> i64 {
        self.last_pts
    }

    pub fn last_dts(&self) -> i64 {
        self.last_dts
    }

    pub fn gap_length(&self) -> i64 {
        self.gap_length
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Shift applied to every timestamp when resuming a previous publish
    pub fn publish_offset(&self) -> i64 {
        if self.timestamp_base > 0 {
            self.timestamp_base + self.sample_interval
        } else {
            0
        }
    }

    /// Back to the state of a fresh session, keeping interval and base
    pub fn reset(&mut self) {
        *self = SampleTimingState::new(self.kind, self.sample_interval, self.timestamp_base);
    }

    fn next_video(&mut self, original_pts: i64, original_dts: Option<i64>, clock_start: i64) -> (i64, i64, bool) {
        let original_dts = match original_dts {
            Some(dts) if dts >= 0 => dts,
            _ => original_pts,
        };
        let offset = self.publish_offset();
        let is_first = !self.has_started();

        let (pts, dts) = if is_first {
            let (pts, dts) = if original_dts > clock_start {
                let dts = clock_start + offset;
                (dts, dts)
            } else {
                (original_pts + offset, original_dts + offset)
            };
            self.start_pts = pts;
            (pts, dts)
        } else if self.gap_length > 0 {
            let frame_offset = (original_dts - self.last_original_dts) - self.gap_length;
            self.gap_length = 0;
            (original_pts + offset, self.last_dts + frame_offset)
        } else {
            (original_pts + offset, self.last_dts + (original_dts - self.last_original_dts))
        };

        self.last_original_pts = original_pts;
        self.last_original_dts = original_dts;
        self.last_pts = pts;
        self.last_dts = dts;
        (pts, dts, is_first)
    }

    fn next_audio(&mut self, original_pts: i64) -> (i64, i64, bool) {
        let pts = original_pts + self.publish_offset();
        let is_first = !self.has_started();
        if is_first {
            self.start_pts = pts;
        }
        self.gap_length = 0;

        self.last_original_pts = original_pts;
        self.last_original_dts = original_pts;
        self.last_pts = pts;
        self.last_dts = pts;
        (pts, pts, is_first)
    }

    fn tick(&mut self, at: i64) {
        if !self.has_started() {
            debug!("Ignoring {} tick at {} before the first sample", self.kind.name(), at);
            return;
        }
        self.gap_length += at - self.last_original_pts;
        self.last_original_pts = at;
        debug!("{} stream gap at {}, gap length {}", self.kind.name(), at, self.gap_length);
    }
}

/// Timing for both media kinds of one publish session.
///
/// All arithmetic is done in 100 ns ticks and only reduced to 32 bit
/// milliseconds when a message is framed. Video DTS follows the source DTS
/// deltas, with any discontinuity reported through [`TimestampSynchronizer::tick`]
/// subtracted once from the next delta. Audio timestamps are the source PTS
/// shifted by the publish offset.
#[derive(Debug, Clone)]
pub struct TimestampSynchronizer {
    clock_start: Option<i64>,
    video: SampleTimingState,
    audio: SampleTimingState,
}

impl TimestampSynchronizer {
    pub fn new(video: SampleTimingState, audio: SampleTimingState) -> Self {
        TimestampSynchronizer {
            clock_start: None,
            video,
            audio,
        }
    }

    /// Record the clock start offset; samples before it are dropped
    pub fn on_clock_start(&mut self, offset: i64) {
        debug!("Clock started at offset {}", offset);
        self.clock_start = Some(offset);
    }

    pub fn clock_start(&self) -> Option<i64> {
        self.clock_start
    }

    pub fn state(&self, kind: MediaKind) -> &SampleTimingState {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    fn state_mut(&mut self, kind: MediaKind) -> &mut SampleTimingState {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Derive timestamps for a sample, or `None` when it must be dropped
    pub fn on_sample(&mut self, kind: MediaKind, pts: i64, dts: Option<i64>) -> Option<SampleTimestamps> {
        let clock_start = self.clock_start?;
        if pts < clock_start {
            trace!("Dropping {} sample at {} before clock start {}", kind.name(), pts, clock_start);
            return None;
        }

        let state = self.state_mut(kind);
        if state.end_of_stream {
            trace!("Dropping {} sample at {} after end of segment", kind.name(), pts);
            return None;
        }

        let (pts, dts, is_first) = match kind {
            MediaKind::Video => state.next_video(pts, dts, clock_start),
            MediaKind::Audio => state.next_audio(pts),
        };

        let wire_pts = ticks_to_rtmp_timestamp(pts);
        let wire_dts = ticks_to_rtmp_timestamp(dts);
        Some(SampleTimestamps {
            pts,
            dts,
            timestamp: wire_dts,
            composition_offset: wire_pts.wrapping_sub(wire_dts),
            is_first,
        })
    }

    /// Discontinuity marker: source time jumped to `at` without a sample
    pub fn tick(&mut self, kind: MediaKind, at: i64) {
        self.state_mut(kind).tick(at);
    }

    pub fn end_of_segment(&mut self, kind: MediaKind) {
        debug!("{} stream end of segment", kind.name());
        self.state_mut(kind).end_of_stream = true;
    }

    pub fn is_end_of_stream(&self, kind: MediaKind) -> bool {
        self.state(kind).end_of_stream
    }

    /// Last derived DTS in ticks, usable as the next session's timestamp base
    pub fn last_dts(&self, kind: MediaKind) -> i64 {
        self.state(kind).last_dts
    }

    /// Forget the clock and every sample; done when the session closes
    pub fn reset(&mut self) {
        self.clock_start = None;
        self.video.reset();
        self.audio.reset();
    }
}
