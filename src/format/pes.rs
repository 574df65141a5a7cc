use bytes::{BufMut, BytesMut};

/// Fixed part of a PES header: start code, stream id, packet length and the
/// two flag bytes plus the header data length byte.
pub const PES_HEADER_SIZE: usize = 9;

/// Smallest prefix that still carries the stream id and packet length field.
pub const PES_MIN_PACKET_SIZE: usize = 6;

/// First stream id of the MPEG video range (`0xE0..=0xEF`).
pub const STREAM_ID_VIDEO: u8 = 0xe0;

/// Timestamp clock rate in Hz.
pub const PTS_HZ: i64 = 90_000;

/// Largest value a 33-bit timestamp can hold.
pub const MAX_PTS: i64 = 0x1_FFFF_FFFF;

/// Returns true if the header's PTS flag is set and the optional header is
/// long enough to carry the 5-byte timestamp.
pub fn has_pts(data: &[u8]) -> bool {
    data.len() >= PES_HEADER_SIZE + 5 && (data[7] & 0x80) != 0 && data[8] >= 5
}

/// Extracts the 33-bit presentation timestamp in 90kHz ticks.
///
/// The result is meaningless unless [`has_pts`] holds; a header shorter than
/// 14 bytes yields 0.
pub fn get_pts(data: &[u8]) -> i64 {
    if data.len() < PES_HEADER_SIZE + 5 {
        return 0;
    }

    ((data[9] as i64 & 0x0E) << 29)
        | ((data[10] as i64) << 22)
        | ((data[11] as i64 & 0xFE) << 14)
        | ((data[12] as i64) << 7)
        | ((data[13] as i64 & 0xFE) >> 1)
}

/// Timestamp of the packet, or `None` if it carries none.
pub fn pts(data: &[u8]) -> Option<i64> {
    has_pts(data).then(|| get_pts(data))
}

/// Offset of the elementary stream payload: the fixed header plus the
/// variable header data length.
pub fn payload_offset(data: &[u8]) -> usize {
    PES_HEADER_SIZE + data.get(8).copied().unwrap_or(0) as usize
}

/// Payload slice of the packet, or `None` if the header claims more bytes
/// than the packet holds.
pub fn payload(data: &[u8]) -> Option<&[u8]> {
    let offset = payload_offset(data);
    (offset < data.len()).then(|| &data[offset..])
}

/// Returns true if the 16-bit packet length field is non-zero. A zero length
/// means the packet extends to the end of the buffer.
pub fn has_length(data: &[u8]) -> bool {
    data.len() >= PES_MIN_PACKET_SIZE && (data[4] | data[5]) != 0
}

/// Total packet length including the six bytes up to and including the
/// length field.
pub fn packet_length(data: &[u8]) -> usize {
    if data.len() < PES_MIN_PACKET_SIZE {
        return data.len();
    }
    PES_MIN_PACKET_SIZE + (((data[4] as usize) << 8) | data[5] as usize)
}

/// Returns true if `remaining` bytes hold a packet header and the whole
/// claimed packet of `len` bytes.
pub fn long_enough(remaining: usize, len: usize) -> bool {
    remaining >= PES_MIN_PACKET_SIZE && len <= remaining
}

/// Stream id byte of the packet.
pub fn stream_id(data: &[u8]) -> Option<u8> {
    data.get(3).copied()
}

/// Returns true for stream ids in the MPEG video range.
pub fn is_video_stream(stream_id: u8) -> bool {
    (stream_id & 0xf0) == STREAM_ID_VIDEO
}

/// Difference `to - from` between two 33-bit timestamps, taking the shorter
/// way around the wrap.
pub fn pts_diff(from: i64, to: i64) -> i64 {
    let d = to - from;
    if d > MAX_PTS / 2 {
        d - (MAX_PTS + 1)
    } else if d < -(MAX_PTS / 2) {
        d + (MAX_PTS + 1)
    } else {
        d
    }
}

/// Packetized Elementary Stream (PES) header as written in front of raw
/// elementary stream data.
#[derive(Debug, Clone, Default)]
pub struct PesHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Value of the packet length field, 0 for unbounded
    pub packet_length: u16,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Presentation Time Stamp (33 bits, 90kHz)
    pub pts: Option<i64>,
}

impl PesHeader {
    /// Creates a new PES header with a specific stream ID.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    /// Sets the Presentation Time Stamp (PTS) in 90kHz ticks.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts & MAX_PTS);
        self
    }

    /// Length of the optional header fields following the fixed part.
    pub fn header_data_length(&self) -> u8 {
        if self.pts.is_some() {
            5
        } else {
            0
        }
    }

    /// Size of the encoded header in bytes.
    pub fn encoded_len(&self) -> usize {
        PES_HEADER_SIZE + self.header_data_length() as usize
    }

    /// Writes the header according to the PES syntax.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(0x01);
        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        // '10' marker bits
        let mut flags = 0x80u8;
        if self.data_alignment {
            flags |= 0x04;
        }
        buf.put_u8(flags);

        let pts_dts_flags = if self.pts.is_some() { 0x80 } else { 0x00 };
        buf.put_u8(pts_dts_flags);
        buf.put_u8(self.header_data_length());

        if let Some(pts) = self.pts {
            write_timestamp(buf, 0x20, pts);
        }
    }

    /// Encodes the header into a new buffer.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }
}

/// A complete PES packet: header plus elementary stream payload.
#[derive(Debug)]
pub struct PesPacket {
    /// PES header containing metadata and flags
    pub header: PesHeader,
    /// Elementary stream payload
    pub payload: Vec<u8>,
}

impl PesPacket {
    /// Creates a new PES packet with the specified stream ID and payload data.
    pub fn new(stream_id: u8, payload: Vec<u8>) -> Self {
        Self {
            header: PesHeader::new(stream_id),
            payload,
        }
    }

    /// Sets the Presentation Time Stamp (PTS) for the packet.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.header = self.header.with_pts(pts);
        self
    }

    /// Fills in the packet length field. Packets too large for the 16-bit
    /// field keep it at 0, which video streams may use for "unbounded".
    pub fn with_length(mut self) -> Self {
        let len = 3 + self.header.header_data_length() as usize + self.payload.len();
        self.header.packet_length = u16::try_from(len).unwrap_or(0);
        self
    }

    /// Writes the complete PES packet to a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.header.write_to(buf);
        buf.extend_from_slice(&self.payload);
    }

    /// Encodes the packet into a new buffer.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }

    /// Returns the total length of the PES packet in bytes.
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len() + self.payload.len()
    }
}

/// Writes a 5-byte timestamp: 4 marker bits, then the 33 bits split 3/15/15
/// with a `1` marker bit after each group.
fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: i64) {
    let ts = (ts & MAX_PTS) as u64;

    buf.put_u8(marker | ((ts >> 29) & 0x0E) as u8 | 0x01);
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn header_with_data_length(len: u8) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x80, 0x00, len];
        data.resize(PES_HEADER_SIZE + len as usize + 4, 0xff);
        data
    }

    #[test]
    fn test_header_writing() {
        let buf = PesHeader::new(0xe0).with_pts(0).to_bytes();

        assert_eq!(
            &buf[..],
            &[0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x80, 0x80, 0x05, 0x21, 0x00, 0x01, 0x00, 0x01]
        );
        assert!(has_pts(&buf));
        assert_eq!(get_pts(&buf), 0);
        assert_eq!(payload_offset(&buf), 14);
    }

    #[test]
    fn test_known_timestamp() {
        let buf = PesHeader::new(0xc0).with_pts(90_000).to_bytes();
        assert_eq!(pts(&buf), Some(90_000));
        assert_eq!(stream_id(&buf), Some(0xc0));
        assert!(!is_video_stream(0xc0));
        assert!(is_video_stream(0xe3));
    }

    #[test]
    fn test_no_pts() {
        let buf = PesHeader::new(0xe0).to_bytes();
        assert!(!has_pts(&buf));
        assert_eq!(pts(&buf), None);
        assert_eq!(payload_offset(&buf), PES_HEADER_SIZE);
    }

    #[test]
    fn test_short_header() {
        let data = [0x00, 0x00, 0x01];
        assert!(!has_pts(&data));
        assert_eq!(get_pts(&data), 0);
        assert!(!has_length(&data));
        assert_eq!(payload(&data), None);
    }

    #[test]
    fn test_packet_length() {
        let packet = PesPacket::new(0xe0, vec![0xaa; 100]).with_pts(1234).with_length();
        let buf = packet.to_bytes();

        assert!(has_length(&buf));
        assert_eq!(packet_length(&buf), buf.len());
        assert_eq!(packet.encoded_len(), buf.len());
        assert_eq!(packet.header.encoded_len(), 14);
        assert_eq!(payload(&buf).map(|p| p.len()), Some(100));

        let unbounded = PesPacket::new(0xe0, vec![0; 70_000]).with_length();
        assert_eq!(unbounded.header.packet_length, 0);
        assert!(!has_length(&unbounded.to_bytes()));
    }

    #[test]
    fn test_long_enough() {
        assert!(long_enough(6, 6));
        assert!(long_enough(100, 20));
        assert!(!long_enough(5, 5));
        assert!(!long_enough(20, 100));
    }

    #[test]
    fn test_pts_diff_wraps() {
        assert_eq!(pts_diff(100, 200), 100);
        assert_eq!(pts_diff(200, 100), -100);
        assert_eq!(pts_diff(MAX_PTS - 9, 10), 20);
        assert_eq!(pts_diff(10, MAX_PTS - 9), -20);
    }

    #[quickcheck]
    fn prop_pts_round_trip(pts: u64) -> bool {
        let pts = (pts & MAX_PTS as u64) as i64;
        let buf = PesHeader::new(0xe0).with_pts(pts).to_bytes();
        has_pts(&buf) && get_pts(&buf) == pts
    }

    #[quickcheck]
    fn prop_payload_offset(len: u8) -> bool {
        payload_offset(&header_with_data_length(len)) == 9 + len as usize
    }
}
