//! Recording collaborators for tests.
//!
//! Each double records what the device asked of it and lets a test script
//! the hardware side: buffer availability, clock value, supported codecs.

use super::{
    AudioDecoder, ClockReference, DeviceEvent, DisplayOutput, EventSender, InputBuffer,
    OsdGeometry, Rect, VideoDecoder, VideoFormat,
};
use crate::codec::VideoCodec;
use crate::config::AudioSettings;
use crate::{PlayError, Result};
use parking_lot::Mutex;

/// Calls made on a [`MockVideoDecoder`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoCall {
    SetVideoCodec(VideoCodec),
    StopVideo,
    FlushVideo(bool),
    SetClockScale(f32),
    SetClockReference(ClockReference),
    StartClock { has_video: bool, has_audio: bool },
    StopClock,
    ResetReferenceTime,
    SetDisplayMode { letterbox: bool, stretch: bool },
    SetDisplayRegion(Rect),
    SetVolume(u8),
    SetMute(bool),
}

#[derive(Debug)]
struct VideoState {
    calls: Vec<VideoCall>,
    submitted: Vec<InputBuffer>,
    buffer_capacity: usize,
    free_buffers: Option<usize>,
    reject_submissions: bool,
    buffers_ready: bool,
    clock: i64,
    clock_running: bool,
    format: VideoFormat,
    supported: Vec<VideoCodec>,
    sink: Option<EventSender>,
    fail_init: bool,
}

/// Scripted stand-in for the hardware video decoder.
#[derive(Debug)]
pub struct MockVideoDecoder {
    state: Mutex<VideoState>,
}

impl MockVideoDecoder {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VideoState {
                calls: Vec::new(),
                submitted: Vec::new(),
                buffer_capacity: 64 * 1024,
                free_buffers: None,
                reject_submissions: false,
                buffers_ready: true,
                clock: 0,
                clock_running: false,
                format: VideoFormat::default(),
                supported: vec![VideoCodec::Mpeg2, VideoCodec::H264],
                sink: None,
                fail_init: false,
            }),
        }
    }

    pub fn with_buffer_capacity(self, capacity: usize) -> Self {
        self.state.lock().buffer_capacity = capacity;
        self
    }

    pub fn with_supported(self, supported: Vec<VideoCodec>) -> Self {
        self.state.lock().supported = supported;
        self
    }

    pub fn with_format(self, format: VideoFormat) -> Self {
        self.state.lock().format = format;
        self
    }

    pub fn failing_init(self) -> Self {
        self.state.lock().fail_init = true;
        self
    }

    /// Limits the number of buffers handed out; `None` is unlimited.
    pub fn set_free_buffers(&self, free: Option<usize>) {
        self.state.lock().free_buffers = free;
    }

    pub fn set_reject_submissions(&self, reject: bool) {
        self.state.lock().reject_submissions = reject;
    }

    pub fn set_buffers_ready(&self, ready: bool) {
        self.state.lock().buffers_ready = ready;
    }

    pub fn set_clock(&self, clock: i64) {
        self.state.lock().clock = clock;
    }

    pub fn calls(&self) -> Vec<VideoCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.submitted.clear();
    }

    pub fn submitted(&self) -> Vec<InputBuffer> {
        self.state.lock().submitted.clone()
    }

    pub fn clock_scales(&self) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VideoCall::SetClockScale(scale) => Some(scale),
                _ => None,
            })
            .collect()
    }

    pub fn last_clock_scale(&self) -> Option<f32> {
        self.clock_scales().last().copied()
    }

    pub fn clock_starts(&self) -> Vec<(bool, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VideoCall::StartClock {
                    has_video,
                    has_audio,
                } => Some((has_video, has_audio)),
                _ => None,
            })
            .collect()
    }

    pub fn has_sink(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Delivers a notification the way the hardware callback thread would.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        match &self.state.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    fn record(&self, call: VideoCall) {
        self.state.lock().calls.push(call);
    }
}

impl Default for MockVideoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecoder for MockVideoDecoder {
    fn init(&self) -> Result<()> {
        if self.state.lock().fail_init {
            return Err(PlayError::HardwareInit("video decoder unavailable".into()));
        }
        Ok(())
    }

    fn deinit(&self) -> Result<()> {
        Ok(())
    }

    fn set_event_sink(&self, sink: Option<EventSender>) {
        self.state.lock().sink = sink;
    }

    fn video_format(&self) -> VideoFormat {
        self.state.lock().format
    }

    fn is_codec_supported(&self, codec: VideoCodec) -> bool {
        self.state.lock().supported.contains(&codec)
    }

    fn set_video_codec(&self, codec: VideoCodec) {
        self.record(VideoCall::SetVideoCodec(codec));
    }

    fn stop_video(&self) {
        self.record(VideoCall::StopVideo);
    }

    fn flush_video(&self, flush_render: bool) {
        self.record(VideoCall::FlushVideo(flush_render));
    }

    fn hardware_clock(&self) -> i64 {
        self.state.lock().clock
    }

    fn is_clock_running(&self) -> bool {
        self.state.lock().clock_running
    }

    fn set_clock_scale(&self, scale: f32) {
        self.record(VideoCall::SetClockScale(scale));
    }

    fn set_clock_reference(&self, reference: ClockReference) {
        self.record(VideoCall::SetClockReference(reference));
    }

    fn start_clock(&self, has_video: bool, has_audio: bool) {
        let mut state = self.state.lock();
        state.clock_running = true;
        state.calls.push(VideoCall::StartClock {
            has_video,
            has_audio,
        });
    }

    fn stop_clock(&self) {
        let mut state = self.state.lock();
        state.clock_running = false;
        state.calls.push(VideoCall::StopClock);
    }

    fn reset_reference_time(&self) {
        self.record(VideoCall::ResetReferenceTime);
    }

    fn get_video_buffer(&self, pts: i64) -> Option<InputBuffer> {
        let mut state = self.state.lock();
        if let Some(free) = state.free_buffers.as_mut() {
            if *free == 0 {
                return None;
            }
            *free -= 1;
        }
        Some(InputBuffer::new(state.buffer_capacity).with_pts(pts))
    }

    fn submit_video_buffer(&self, buffer: InputBuffer) -> bool {
        let mut state = self.state.lock();
        if state.reject_submissions {
            return false;
        }
        state.submitted.push(buffer);
        true
    }

    fn poll_video_buffers(&self) -> bool {
        self.state.lock().buffers_ready
    }

    fn set_display_mode(&self, letterbox: bool, stretch: bool) {
        self.record(VideoCall::SetDisplayMode { letterbox, stretch });
    }

    fn set_display_region(&self, rect: Rect) {
        self.record(VideoCall::SetDisplayRegion(rect));
    }

    fn set_volume(&self, volume: u8) {
        self.record(VideoCall::SetVolume(volume));
    }

    fn set_mute(&self, mute: bool) {
        self.record(VideoCall::SetMute(mute));
    }
}

#[derive(Debug, Default)]
struct AudioState {
    frames: Vec<(Vec<u8>, i64)>,
    reject_writes: bool,
    not_ready: bool,
    resets: usize,
    settings: Vec<AudioSettings>,
    fail_init: bool,
}

/// Scripted stand-in for the audio decoder.
#[derive(Debug, Default)]
pub struct MockAudioDecoder {
    state: Mutex<AudioState>,
}

impl MockAudioDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init(self) -> Self {
        self.state.lock().fail_init = true;
        self
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.state.lock().reject_writes = reject;
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().not_ready = !ready;
    }

    pub fn frames(&self) -> Vec<(Vec<u8>, i64)> {
        self.state.lock().frames.clone()
    }

    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn settings(&self) -> Vec<AudioSettings> {
        self.state.lock().settings.clone()
    }
}

impl AudioDecoder for MockAudioDecoder {
    fn init(&self) -> Result<()> {
        if self.state.lock().fail_init {
            return Err(PlayError::HardwareInit("audio output unavailable".into()));
        }
        Ok(())
    }

    fn deinit(&self) -> Result<()> {
        Ok(())
    }

    fn write_data(&self, data: &[u8], pts: i64) -> bool {
        let mut state = self.state.lock();
        if state.reject_writes {
            return false;
        }
        state.frames.push((data.to_vec(), pts));
        true
    }

    fn reset(&self) {
        self.state.lock().resets += 1;
    }

    fn poll_ready(&self) -> bool {
        !self.state.lock().not_ready
    }

    fn apply_settings(&self, settings: &AudioSettings) {
        self.state.lock().settings.push(settings.clone());
    }
}

#[derive(Debug, Default)]
struct DisplayState {
    geometry: OsdGeometry,
    formats: Vec<VideoFormat>,
    errors: Vec<String>,
}

/// Display double recording format changes and queued messages.
#[derive(Debug, Default)]
pub struct MockDisplay {
    state: Mutex<DisplayState>,
}

impl MockDisplay {
    pub fn new(geometry: OsdGeometry) -> Self {
        Self {
            state: Mutex::new(DisplayState {
                geometry,
                ..Default::default()
            }),
        }
    }

    pub fn formats(&self) -> Vec<VideoFormat> {
        self.state.lock().formats.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state.lock().errors.clone()
    }
}

impl DisplayOutput for MockDisplay {
    fn osd_geometry(&self) -> OsdGeometry {
        self.state.lock().geometry
    }

    fn set_video_format(&self, format: &VideoFormat) {
        self.state.lock().formats.push(*format);
    }

    fn queue_error(&self, message: &str) {
        self.state.lock().errors.push(message.to_string());
    }
}
