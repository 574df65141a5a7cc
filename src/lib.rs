#![doc(html_root_url = "https://docs.rs/hwplay/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # hwplay - Hardware Playback Core
//!
//! `hwplay` sits between a player that delivers PES packets and a hardware
//! decoder pipeline with its own presentation clock. It decides when the
//! clock starts and which stream drives it, how fast it runs, and how
//! packets are cut into decoder input buffers.
//!
//! ## Features
//!
//! - PES header parsing: timestamps, payload offset, packet length
//! - MPEG-2 and H.264 detection from elementary stream start codes
//! - Trick speeds, including fast modes whose direction is inferred from
//!   the timestamps the player sends
//! - Live latency correction through small clock rate adjustments
//! - Still pictures from raw elementary stream or PES data
//! - Decoder backpressure: packets the hardware can't take yet are
//!   reported as not consumed
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hwplay::av::testing::{MockAudioDecoder, MockDisplay, MockVideoDecoder};
//! use hwplay::config::Config;
//! use hwplay::device::{Device, PlayMode};
//! use hwplay::format::PesPacket;
//!
//! let video = Arc::new(MockVideoDecoder::new());
//! let device = Device::new(
//!     video.clone(),
//!     Arc::new(MockAudioDecoder::new()),
//!     Arc::new(MockDisplay::default()),
//!     Config::default(),
//! );
//!
//! device.set_play_mode(PlayMode::VideoOnly);
//!
//! // MPEG-2 sequence header
//! let frame = vec![0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33];
//! let packet = PesPacket::new(0xe0, frame).with_pts(90_000).to_bytes();
//! assert_eq!(device.play_video(&packet, true), packet.len());
//! assert_eq!(video.submitted().len(), 1);
//! ```
//!
//! ## Module Overview
//!
//! - `av`: collaborator traits for decoder, audio path and display, plus
//!   recording doubles for tests
//! - `codec`: video codec detection
//! - `config`: persisted device setup
//! - `device`: the playback orchestrator
//! - `format`: PES framing
//! - `playback`: trick speed and latency state machines
//! - `error`: error type and result alias

/// Hardware collaborator traits and notification types
pub mod av;

/// Video codec detection
pub mod codec;

/// Device setup
pub mod config;

/// Playback orchestration over the hardware collaborators
pub mod device;

/// Error types and utilities
pub mod error;

/// PES packet framing
pub mod format;

/// Clock speed, trick play and live latency control
pub mod playback;

pub use device::Device;
pub use error::{PlayError, Result};
