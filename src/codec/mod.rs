//! # Video Codec Detection
//!
//! Elementary stream payloads arrive either raw (still pictures from plugins)
//! or wrapped in PES. The sniffer looks for an MPEG start code at the very
//! beginning of the payload and classifies the stream from the unit that
//! follows it.

/// Start-code heuristics for MPEG-2 and H.264 payloads
pub mod sniffer;

pub use sniffer::{parse_video_codec, SliceType};

use std::fmt;

/// Video codecs the hardware decoder can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// No codec detected yet, or the payload was not recognized
    #[default]
    Invalid,
    /// MPEG-2 video
    Mpeg2,
    /// H.264/AVC
    H264,
}

impl VideoCodec {
    /// Returns true for an actual codec.
    pub fn is_valid(self) -> bool {
        self != VideoCodec::Invalid
    }

    /// Number of times a still frame has to be submitted before the decoder
    /// latches it for display.
    pub fn still_picture_repeats(self) -> usize {
        match self {
            VideoCodec::Mpeg2 => 4,
            _ => 10,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoCodec::Invalid => "invalid",
            VideoCodec::Mpeg2 => "MPEG2",
            VideoCodec::H264 => "H264",
        };
        f.write_str(name)
    }
}
