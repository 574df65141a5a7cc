//! # Packetized Elementary Stream (PES) Framing
//!
//! Pure parsing helpers over caller-owned PES packets: timestamp extraction,
//! payload location and packet length, plus a small header writer used to
//! wrap raw elementary stream data.
//!
//! ```rust
//! use hwplay::format::pes::{self, PesPacket};
//!
//! let frame = [0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33];
//! let packet = PesPacket::new(0xe0, frame.to_vec())
//!     .with_pts(90_000)
//!     .to_bytes();
//!
//! assert_eq!(pes::pts(&packet), Some(90_000));
//! assert_eq!(pes::payload(&packet), Some(&frame[..]));
//! ```

/// PES header parsing and writing
pub mod pes;

pub use pes::{PesHeader, PesPacket};
