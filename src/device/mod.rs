//! # Output Device
//!
//! [`Device`] ties the PES framer, codec sniffer, trick tracker and latency
//! corrector to the hardware collaborators. Every entry point takes the one
//! device lock for its whole duration, so packet ingestion from the player
//! thread and notifications from the hardware never interleave.
//!
//! The presentation clock starts with the first packet of whichever stream
//! shows up first; that stream also becomes the clock reference until both
//! streams are gone again.

use crate::av::{
    AudioDecoder, ClockReference, DeviceEvent, DisplayOutput, EventReceiver, EventSender,
    OsdGeometry, Rect, VideoDecoder, VideoFormat,
};
use crate::codec::{parse_video_codec, VideoCodec};
use crate::config::{Config, LatencyConfig, SetupChange};
use crate::format::pes::{self, PesPacket, PES_MIN_PACKET_SIZE, STREAM_ID_VIDEO};
use crate::playback::{LatencyCorrector, LiveSpeed, PlaybackState, TrickTracker};
use crate::{PlayError, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};


/// Sleep between readiness checks in [`Device::poll`].
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Transport stream sync byte.
const TS_SYNC_BYTE: u8 = 0x47;

/// Audio substream ids carrying a 4-byte header in PES recordings:
/// AC3, DTS and LPCM.
const AUDIO_SUBSTREAM_IDS: [u8; 3] = [0x80, 0x88, 0xa0];
const AUDIO_SUBSTREAM_HEADER_SIZE: usize = 4;

/// Stream layout announced by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    None,
    AudioVideo,
    AudioOnly,
    AudioOnlyBlack,
    VideoOnly,
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayMode::None => "none",
            PlayMode::AudioVideo => "Audio/Video",
            PlayMode::AudioOnly => "Audio only",
            PlayMode::AudioOnlyBlack => "Audio only, black",
            PlayMode::VideoOnly => "Video only",
        })
    }
}

#[derive(Debug)]
struct DeviceState {
    config: Config,
    play_mode: PlayMode,
    playback: PlaybackState,
    video_codec: VideoCodec,
    has_audio: bool,
    has_video: bool,
    audio_id: u8,
    live: bool,
    frozen: bool,
    trick: TrickTracker,
    latency: LatencyCorrector,
    events: Option<EventSender>,
}

impl DeviceState {
    /// Live correction only runs at normal forward speed, not frozen, with
    /// no trick request waiting for its direction.
    fn corrects_latency(&self) -> bool {
        self.live && !self.frozen && self.playback.is_normal() && self.trick.pending().is_none()
    }

    /// Scale the clock should run at: paused while frozen.
    fn clock_scale(&self) -> f32 {
        if self.frozen {
            PlaybackState::paused_scale()
        } else {
            self.playback.clock_scale()
        }
    }
}

/// Playback device driving a hardware decoder pipeline.
pub struct Device {
    video: Arc<dyn VideoDecoder>,
    audio: Arc<dyn AudioDecoder>,
    display: Arc<dyn DisplayOutput>,
    state: Mutex<DeviceState>,
}

impl Device {
    /// Creates an idle device over its collaborators. Nothing touches the
    /// hardware before [`Device::init`].
    pub fn new(
        video: Arc<dyn VideoDecoder>,
        audio: Arc<dyn AudioDecoder>,
        display: Arc<dyn DisplayOutput>,
        config: Config,
    ) -> Self {
        Self {
            video,
            audio,
            display,
            state: Mutex::new(DeviceState {
                config,
                play_mode: PlayMode::None,
                playback: PlaybackState::default(),
                video_codec: VideoCodec::Invalid,
                has_audio: false,
                has_video: false,
                audio_id: 0,
                live: false,
                frozen: false,
                trick: TrickTracker::new(),
                latency: LatencyCorrector::default(),
                events: None,
            }),
        }
    }

    /// Replaces the latency filter tuning.
    pub fn with_latency_config(self, config: LatencyConfig) -> Self {
        self.state.lock().latency = LatencyCorrector::new(config);
        self
    }

    /// Brings up the video decoder, then the audio path, and installs the
    /// notification channel. Any failure is fatal for the device.
    pub fn init(&self) -> Result<EventReceiver> {
        self.video.init().map_err(|e| {
            error!("failed to initialize video decoder: {}", e);
            PlayError::HardwareInit(format!("video decoder: {}", e))
        })?;
        self.audio.init().map_err(|e| {
            error!("failed to initialize audio: {}", e);
            PlayError::HardwareInit(format!("audio: {}", e))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.video.set_event_sink(Some(tx.clone()));
        self.state.lock().events = Some(tx);
        Ok(rx)
    }

    /// Removes the notification channel and shuts down audio, then video.
    pub fn deinit(&self) -> Result<()> {
        self.video.set_event_sink(None);
        self.state.lock().events = None;

        self.audio.deinit().map_err(|e| {
            error!("failed to deinitialize audio: {}", e);
            e
        })?;
        self.video.deinit().map_err(|e| {
            error!("failed to deinitialize video decoder: {}", e);
            e
        })
    }

    /// Applies the current video setup to decoder and display.
    pub fn start(&self) {
        let state = self.state.lock();
        self.apply_video_setup(&state);
    }

    /// Sender for notifications originating outside the decoder, such as
    /// setup changes. `None` before [`Device::init`].
    pub fn event_sender(&self) -> Option<EventSender> {
        self.state.lock().events.clone()
    }

    /// Dispatches notifications until every sender is gone.
    pub async fn run_events(&self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("event channel closed");
    }

    /// Reacts to one hardware or setup notification. Stalls and end of
    /// stream flush both pipes and restart the clock at the current speed.
    pub fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::BufferStall => {
                error!("buffer stall!");
                self.resync();
            }
            DeviceEvent::EndOfStream => {
                debug!("HandleEndOfStream()");
                // flush pipes and restart clock after still image
                self.resync();
            }
            DeviceEvent::StreamStart => self.handle_stream_start(),
            DeviceEvent::VideoSetupChanged(config) => {
                self.apply_config(config);
            }
        }
    }

    /// Takes over a new setup. Video changes reconfigure framing and output
    /// format, audio changes go to the audio path.
    pub fn apply_config(&self, config: Config) -> SetupChange {
        let mut state = self.state.lock();
        let change = SetupChange::between(&state.config, &config);
        state.config = config;

        if change.audio {
            self.audio.apply_settings(&state.config.audio);
        }
        if change.video {
            self.apply_video_setup(&state);
        }
        change
    }

    /// Announces the stream layout. `PlayMode::None` tears the streams
    /// down; any other mode returns to normal forward play.
    pub fn set_play_mode(&self, mode: PlayMode) {
        let mut state = self.state.lock();
        debug!("SetPlayMode({})", mode);

        // Streams start with their first packet, since the mode alone
        // doesn't say whether audio, video or both will follow.
        match mode {
            PlayMode::None => {
                self.flush_streams(&mut state, true);
                if state.has_video {
                    self.video.stop_video();
                }
                state.has_audio = false;
                state.has_video = false;
                state.video_codec = VideoCodec::Invalid;
            }
            _ => state.playback.reset(),
        }
        state.trick.reset();
        state.frozen = false;
        state.play_mode = mode;
    }

    pub fn play_mode(&self) -> PlayMode {
        self.state.lock().play_mode
    }

    /// Marks whether the player is transferring a live stream.
    pub fn set_live(&self, live: bool) {
        let mut state = self.state.lock();
        if live && !state.live {
            state.latency.reset();
        }
        state.live = live;
    }

    /// Resumes normal forward play.
    pub fn play(&self) {
        debug!("Play()");
        let mut state = self.state.lock();
        state.trick.reset();
        state.playback.reset();
        state.frozen = false;
        self.video.set_clock_scale(state.clock_scale());
    }

    /// Halts the clock until the next [`Device::play`], trick speed,
    /// [`Device::clear`] or play mode change.
    pub fn freeze(&self) {
        debug!("Freeze()");
        let mut state = self.state.lock();
        state.trick.reset();
        state.frozen = true;
        self.video.set_clock_scale(state.clock_scale());
    }

    /// Drops everything queued. The next packet restarts the stream.
    pub fn clear(&self) {
        debug!("Clear()");
        let mut state = self.state.lock();
        self.flush_streams(&mut state, false);
        state.has_audio = false;
        state.has_video = false;
        state.frozen = false;
        state.trick.reset();
    }

    /// Switches to a trick speed. With a direction the code applies at once;
    /// without one, the fast codes wait until the timestamps reveal which way
    /// the player feeds the stream.
    pub fn request_trick_speed(&self, code: u8, forward: Option<bool>) {
        let mut state = self.state.lock();
        match forward {
            Some(forward) => {
                state.trick.reset();
                self.apply_playback(&mut state, PlaybackState::from_trick_code(code, forward));
            }
            None => match state.trick.request(code) {
                Some(playback) => self.apply_playback(&mut state, playback),
                None => debug!("TrickSpeed({}): direction pending", code),
            },
        }
    }

    /// Queues one audio PES packet. Returns the number of bytes consumed,
    /// 0 if the audio path is full and the packet has to be offered again.
    pub fn play_audio(&self, data: &[u8], id: u8) -> usize {
        let mut state = self.state.lock();

        if !state.has_audio {
            state.has_audio = true;
            state.audio_id = id;

            if !state.has_video {
                debug!("audio first");
                self.video.set_clock_reference(ClockReference::Audio);
                self.video.set_clock_scale(state.clock_scale());
                self.video.start_clock(state.has_video, state.has_audio);
            }

            if state.live {
                state.latency.reset();
            }
        }

        let pts = pes::pts(data).filter(|&pts| pts != 0);

        if let Some(pts) = pts {
            if let Some(playback) = state.trick.track_audio(pts) {
                self.apply_playback(&mut state, playback);
            }

            if state.corrects_latency() {
                if state.audio_id != id {
                    state.latency.reset();
                    state.audio_id = id;
                }
                self.update_latency(&mut state, pts);
            }
        }

        let Some(mut payload) = pes::payload(data) else {
            warn!("skipping audio packet with invalid payload offset");
            return data.len();
        };

        if AUDIO_SUBSTREAM_IDS.contains(&payload[0]) && payload[0] == id {
            payload = payload.get(AUDIO_SUBSTREAM_HEADER_SIZE..).unwrap_or(&[]);
        }

        if !payload.is_empty() && !self.audio.write_data(payload, pts.unwrap_or(0)) {
            return 0;
        }
        data.len()
    }

    /// Queues one video PES packet. Returns the number of bytes consumed,
    /// 0 if no decoder buffer was available or submission failed; the
    /// caller retries the whole packet later.
    pub fn play_video(&self, data: &[u8], end_of_frame: bool) -> usize {
        let mut state = self.state.lock();
        self.play_video_locked(&mut state, data, end_of_frame)
    }

    /// Shows a single frame. Raw elementary stream data gets a PES header,
    /// then the frame is submitted repeatedly until the decoder shows it.
    pub fn still_picture(&self, data: &[u8]) -> Result<()> {
        if data.first() == Some(&TS_SYNC_BYTE) {
            return Err(PlayError::InvalidData(
                "transport stream still pictures are not supported".into(),
            ));
        }

        debug!("StillPicture()");
        let mut codec = parse_video_codec(data);
        let wrapped;
        let packets: &[u8] = if codec.is_valid() {
            wrapped = PesPacket::new(STREAM_ID_VIDEO, data.to_vec())
                .with_pts(0)
                .to_bytes();
            &wrapped[..]
        } else {
            codec = pes::payload(data).map(parse_video_codec).unwrap_or_default();
            data
        };

        if !codec.is_valid() {
            return Err(PlayError::InvalidData("no video found in still picture".into()));
        }

        let mut state = self.state.lock();
        state.playback.reset();
        state.trick.reset();
        self.video.stop_clock();

        for _ in 0..codec.still_picture_repeats() {
            let mut rest = packets;
            while rest.len() >= PES_MIN_PACKET_SIZE {
                let len = if pes::has_length(rest) {
                    pes::packet_length(rest)
                } else {
                    rest.len()
                };
                if !pes::long_enough(rest.len(), len) {
                    warn!("truncated PES packet in still picture");
                    break;
                }

                let (packet, tail) = rest.split_at(len);

                // skip non-video packets as they may occur in PES recordings
                if pes::stream_id(packet).is_some_and(pes::is_video_stream) {
                    self.play_video_locked(&mut state, packet, tail.is_empty());
                }
                rest = tail;
            }
        }

        self.submit_eos();
        Ok(())
    }

    /// Waits until both decoders accept more data, checking every few
    /// milliseconds. Returns false on timeout.
    pub async fn poll(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.video.poll_video_buffers() || !self.audio.poll_ready() {
            if start.elapsed() >= timeout {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
        true
    }

    /// Presentation clock in 90kHz ticks.
    pub fn presentation_clock(&self) -> i64 {
        let _state = self.state.lock();
        self.video.hardware_clock()
    }

    /// Native video size and aspect ratio.
    pub fn video_size(&self) -> (u32, u32, f64) {
        let _state = self.state.lock();
        let format = self.video.video_format();
        (format.width, format.height, format.aspect())
    }

    pub fn osd_size(&self) -> OsdGeometry {
        let _state = self.state.lock();
        self.display.osd_geometry()
    }

    pub fn scale_video(&self, rect: Rect) {
        debug!(
            "ScaleVideo({}, {}, {}, {})",
            rect.x, rect.y, rect.width, rect.height
        );
        let _state = self.state.lock();
        self.video.set_display_region(rect);
    }

    /// Sets the output volume; 0 mutes.
    pub fn set_volume(&self, volume: u8) {
        debug!("SetVolume({})", volume);
        let _state = self.state.lock();
        if volume > 0 {
            self.video.set_volume(volume);
            self.video.set_mute(false);
        } else {
            self.video.set_mute(true);
        }
    }

    /// Trick play of I, B and P frames is only possible without video.
    pub fn has_ibp_trick_speed(&self) -> bool {
        !self.state.lock().has_video
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state.lock().playback
    }

    pub fn has_audio(&self) -> bool {
        self.state.lock().has_audio
    }

    pub fn has_video(&self) -> bool {
        self.state.lock().has_video
    }

    pub fn video_codec(&self) -> VideoCodec {
        self.state.lock().video_codec
    }

    pub fn live_speed(&self) -> LiveSpeed {
        self.state.lock().latency.level()
    }

    fn play_video_locked(&self, state: &mut DeviceState, data: &[u8], end_of_frame: bool) -> usize {
        // payload alignment is only guaranteed on packets carrying a PTS
        let codec = if pes::has_pts(data) {
            pes::payload(data).map(parse_video_codec).unwrap_or_default()
        } else {
            VideoCodec::Invalid
        };

        // restart after Clear() with the same codec
        let mut restart =
            !state.has_video && codec == state.video_codec && self.video.is_codec_supported(codec);

        // restart after SetPlayMode() or a codec change
        if codec.is_valid() && codec != state.video_codec {
            state.video_codec = codec;

            if state.has_video {
                self.video.stop_video();
                state.has_video = false;
            }

            if self.video.is_codec_supported(codec) {
                restart = true;
                self.video.set_video_codec(codec);
                info!("set video codec to {}", codec);
            } else {
                warn!("{} video not supported by decoder", codec);
                self.display.queue_error("video format not supported!");
            }
        }

        if restart {
            state.has_video = true;

            if !state.has_audio {
                debug!("video first");
                self.video.set_clock_reference(ClockReference::Video);
                self.video.set_clock_scale(state.clock_scale());
                self.video.start_clock(state.has_video, state.has_audio);
            }

            if state.live {
                state.latency.reset();
            }
        }

        if !state.has_video {
            return data.len();
        }

        let pts = pes::pts(data).filter(|&pts| pts != 0);

        if let (Some(pts), false) = (pts, state.has_audio) {
            if let Some(playback) = state.trick.track_video(pts) {
                self.apply_playback(state, playback);
            }
            if state.corrects_latency() {
                self.update_latency(state, pts);
            }
        }

        let Some(mut payload) = pes::payload(data) else {
            return data.len();
        };

        let mut buffer_pts = pts.unwrap_or(0);
        while !payload.is_empty() {
            let Some(mut buffer) = self.video.get_video_buffer(buffer_pts) else {
                return 0;
            };

            let filled = buffer.fill(payload);
            if filled == 0 {
                error!("video decoder handed out a zero-sized buffer!");
                return 0;
            }
            payload = &payload[filled..];

            if end_of_frame && payload.is_empty() {
                buffer.end_of_frame = true;
            }

            if !self.video.submit_video_buffer(buffer) {
                error!("failed to pass buffer to video decoder!");
                return 0;
            }
            buffer_pts = 0;
        }

        data.len()
    }

    fn submit_eos(&self) -> bool {
        debug!("SubmitEOS()");
        let Some(mut buffer) = self.video.get_video_buffer(0) else {
            warn!("no buffer left for end of stream");
            return false;
        };
        buffer.end_of_stream = true;
        self.video.submit_video_buffer(buffer)
    }

    fn apply_playback(&self, state: &mut DeviceState, playback: PlaybackState) {
        state.playback = playback;
        state.frozen = false;
        self.video.set_clock_scale(playback.clock_scale());
        debug!("ApplyTrickSpeed({}, {})", playback.speed, playback.direction);
    }

    fn update_latency(&self, state: &mut DeviceState, pts: i64) {
        if !self.video.is_clock_running() {
            return;
        }

        let Some(latency) = LatencyCorrector::sample_from(pts, self.video.hardware_clock()) else {
            return;
        };

        if let Some(level) = state.latency.push_sample(latency) {
            self.video.set_clock_scale(level.clock_scale());
        }
    }

    fn flush_streams(&self, state: &mut DeviceState, flush_render: bool) {
        debug!("FlushStreams({})", if flush_render { "flushVideoRender" } else { "" });

        self.video.stop_clock();
        self.video.set_clock_scale(PlaybackState::paused_scale());

        if state.has_video {
            self.video.flush_video(flush_render);
        }
        if state.has_audio {
            self.audio.reset();
        }

        self.video.reset_reference_time();
        state.latency.reset();
    }

    /// Flushes everything and restarts the clock at the active speed.
    fn resync(&self) {
        let mut state = self.state.lock();
        self.flush_streams(&mut state, false);
        self.video.set_clock_scale(state.clock_scale());
        self.video.start_clock(state.has_video, state.has_audio);
    }

    fn handle_stream_start(&self) {
        let _state = self.state.lock();
        let format = self.video.video_format();
        info!(
            "video stream started {}x{}@{}{}",
            format.width,
            format.height,
            format.frame_rate,
            if format.interlaced { "i" } else { "p" }
        );
        self.display.set_video_format(&format);
    }

    fn apply_video_setup(&self, state: &DeviceState) {
        debug!("HandleVideoSetupChanged()");
        let (letterbox, stretch) = state.config.video.framing.display_mode();
        self.video.set_display_mode(letterbox, stretch);

        let format: VideoFormat = self.video.video_format();
        self.display.set_video_format(&format);
    }
}
