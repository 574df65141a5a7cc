use super::VideoCodec;

/// Number of leading payload offsets searched for a start code.
const SCAN_OFFSETS: usize = 5;

/// MPEG-2 sequence header start code value.
const MPEG2_SEQUENCE_HEADER: u8 = 0xb3;

/// H.264 access unit delimiter NAL unit (nal_ref_idc 0, type 9).
const H264_ACCESS_UNIT_DELIMITER: u8 = 0x09;

/// Frame class announced by the `primary_pic_type` field of an H.264 access
/// unit delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    /// Only intra coded slices (types 0, 3, 5)
    I,
    /// Predicted slices may be present (types 1, 4, 6)
    P,
    /// Bi-predicted slices may be present (types 2, 7)
    B,
}

impl From<u8> for SliceType {
    /// Classifies the top three bits of the byte following the delimiter.
    fn from(value: u8) -> Self {
        match value >> 5 {
            0 | 3 | 5 => SliceType::I,
            2 | 7 => SliceType::B,
            _ => SliceType::P,
        }
    }
}

/// Classifies an elementary stream payload as MPEG-2, H.264 or neither.
///
/// The start code is expected right at the beginning of the payload, so only
/// the first few offsets are tried. Scanning stops at the first start code:
/// any unit other than an MPEG-2 sequence header or an H.264 access unit
/// delimiter yields [`VideoCodec::Invalid`].
///
/// Every delimiter is accepted as H.264 regardless of the frame class it
/// announces. Streams converted from Matroska start on P or B frames, so
/// rejecting them would leave such streams without video.
pub fn parse_video_codec(data: &[u8]) -> VideoCodec {
    for i in (0..SCAN_OFFSETS).take_while(|i| i + 4 < data.len()) {
        if data[i] != 0 || data[i + 1] != 0 || data[i + 2] != 0x01 {
            continue;
        }

        return match data[i + 3] {
            MPEG2_SEQUENCE_HEADER => VideoCodec::Mpeg2,
            H264_ACCESS_UNIT_DELIMITER => {
                let slice_type = SliceType::from(data[i + 4]);
                log::trace!("access unit delimiter announces {:?} frame", slice_type);
                VideoCodec::H264
            }
            _ => VideoCodec::Invalid,
        };
    }

    VideoCodec::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mpeg2_sequence_header() {
        let data = [0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40];
        assert_eq!(parse_video_codec(&data), VideoCodec::Mpeg2);
    }

    #[test]
    fn test_start_code_within_scan_window() {
        // Offsets 0..=4 are searched
        let mut data = vec![0xff; 4];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb3, 0x10]);
        assert_eq!(parse_video_codec(&data), VideoCodec::Mpeg2);

        let mut data = vec![0xff; 5];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb3, 0x10]);
        assert_eq!(parse_video_codec(&data), VideoCodec::Invalid);
    }

    #[test]
    fn test_h264_any_slice_type() {
        for pic_type in 0u8..8 {
            let data = [0x00, 0x00, 0x01, 0x09, pic_type << 5, 0x00];
            assert_eq!(
                parse_video_codec(&data),
                VideoCodec::H264,
                "primary_pic_type {}",
                pic_type
            );
        }

        let converted_mkv = [0x00, 0x00, 0x01, 0x09, 0xf0, 0x00];
        assert_eq!(parse_video_codec(&converted_mkv), VideoCodec::H264);
    }

    #[test]
    fn test_slice_type_classes() {
        assert_eq!(SliceType::from(0x00), SliceType::I);
        assert_eq!(SliceType::from(0x60), SliceType::I);
        assert_eq!(SliceType::from(0xa0), SliceType::I);
        assert_eq!(SliceType::from(0x20), SliceType::P);
        assert_eq!(SliceType::from(0x40), SliceType::B);
        assert_eq!(SliceType::from(0xf0), SliceType::B);
    }

    #[test]
    fn test_other_unit_stops_scanning() {
        // A PES start code (stream id 0xe0) is found first; the sequence
        // header behind it is never looked at.
        let data = [0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x01, 0xb3, 0x00];
        assert_eq!(parse_video_codec(&data), VideoCodec::Invalid);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(parse_video_codec(&[]), VideoCodec::Invalid);
        assert_eq!(parse_video_codec(&[0x00, 0x00, 0x01, 0xb3]), VideoCodec::Invalid);
    }

    #[test]
    fn test_still_picture_repeats() {
        assert_eq!(VideoCodec::Mpeg2.still_picture_repeats(), 4);
        assert_eq!(VideoCodec::H264.still_picture_repeats(), 10);
        assert!(!VideoCodec::Invalid.is_valid());
    }
}
