//! # Hardware Collaborators
//!
//! The device core never touches hardware directly. It drives three
//! collaborators through the traits defined here:
//!
//! - [`VideoDecoder`]: the hardware video decoder and presentation clock
//! - [`AudioDecoder`]: the audio decode/output path
//! - [`DisplayOutput`]: display geometry and user-visible messages
//!
//! Asynchronous hardware notifications come back as [`DeviceEvent`] values
//! over an unbounded channel. The decoder keeps at most one [`EventSender`];
//! the device installs it on init and removes it on deinit.

use crate::codec::VideoCodec;
use crate::config::{AudioSettings, Config};
use crate::Result;
use tokio::sync::mpsc;

mod buffer;
pub mod testing;

pub use buffer::*;

/// Notifications delivered to the device from its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The decoder ran dry while the clock was running
    BufferStall,
    /// An end-of-stream buffer went through the decoder
    EndOfStream,
    /// The decoder reported the format of a new video stream
    StreamStart,
    /// The persisted video setup changed
    VideoSetupChanged(Config),
}

/// Sending half of the notification channel.
pub type EventSender = mpsc::UnboundedSender<DeviceEvent>;

/// Receiving half of the notification channel.
pub type EventReceiver = mpsc::UnboundedReceiver<DeviceEvent>;

/// Which stream drives the presentation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockReference {
    Audio,
    Video,
}

/// Native format of the decoded video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub interlaced: bool,
}

impl VideoFormat {
    /// Width over height, or 1.0 while the height is unknown.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Size of the on-screen display surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OsdGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_aspect: f64,
}

/// Output rectangle for scaled video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Hardware video decoder with its presentation clock.
pub trait VideoDecoder: Send + Sync {
    /// Brings up the decoder. Failure is fatal for the device.
    fn init(&self) -> Result<()>;
    fn deinit(&self) -> Result<()>;

    /// Installs or removes the notification sink.
    fn set_event_sink(&self, sink: Option<EventSender>);

    /// Native format of the stream currently decoded.
    fn video_format(&self) -> VideoFormat;
    fn is_codec_supported(&self, codec: VideoCodec) -> bool;
    /// Reconfigures the decoder for a new codec.
    fn set_video_codec(&self, codec: VideoCodec);
    fn stop_video(&self);
    /// Drops queued input; with `flush_render` the displayed frame too.
    fn flush_video(&self, flush_render: bool);

    /// Current presentation clock in 90kHz ticks.
    fn hardware_clock(&self) -> i64;
    fn is_clock_running(&self) -> bool;
    /// Signed clock rate: 1.0 is normal, 0.0 halts, negative runs backwards.
    fn set_clock_scale(&self, scale: f32);
    /// Selects the stream the clock follows.
    fn set_clock_reference(&self, reference: ClockReference);
    /// Starts the clock, waiting for the streams that are present.
    fn start_clock(&self, has_video: bool, has_audio: bool);
    fn stop_clock(&self);
    fn reset_reference_time(&self);

    /// Hands out an empty input buffer, or `None` if the decoder is full.
    fn get_video_buffer(&self, pts: i64) -> Option<InputBuffer>;
    /// Queues a filled buffer. Returns false if the decoder rejected it.
    fn submit_video_buffer(&self, buffer: InputBuffer) -> bool;
    /// Returns true if input buffers are available.
    fn poll_video_buffers(&self) -> bool;

    /// Fitting of the picture into the output frame.
    fn set_display_mode(&self, letterbox: bool, stretch: bool);
    /// Output rectangle for scaled video; an empty rect is fullscreen.
    fn set_display_region(&self, rect: Rect);
    fn set_volume(&self, volume: u8);
    fn set_mute(&self, mute: bool);
}

/// Audio decode and output path.
pub trait AudioDecoder: Send + Sync {
    fn init(&self) -> Result<()>;
    fn deinit(&self) -> Result<()>;

    /// Queues one audio frame. Returns false if the queue is full.
    fn write_data(&self, data: &[u8], pts: i64) -> bool;
    /// Drops everything queued.
    fn reset(&self);
    /// Returns true if more audio can be queued.
    fn poll_ready(&self) -> bool;

    fn apply_settings(&self, _settings: &AudioSettings) {}
}

/// Display output and message overlay.
pub trait DisplayOutput: Send + Sync {
    fn osd_geometry(&self) -> OsdGeometry;
    fn set_video_format(&self, format: &VideoFormat);
    fn queue_error(&self, message: &str);
}
