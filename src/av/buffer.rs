use bytes::{Bytes, BytesMut};

/// Decoder input buffer handed out by [`super::VideoDecoder::get_video_buffer`].
#[derive(Debug, Clone)]
pub struct InputBuffer {
    pub data: BytesMut,
    pub capacity: usize,
    pub pts: i64,
    pub end_of_frame: bool,
    pub end_of_stream: bool,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            pts: 0,
            end_of_frame: false,
            end_of_stream: false,
        }
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = pts;
        self
    }

    /// Copies as much of `data` as fits and returns the number of bytes taken.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let len = self.capacity.saturating_sub(self.data.len()).min(data.len());
        self.data.extend_from_slice(&data[..len]);
        len
    }

    pub fn filled_len(&self) -> usize {
        self.data.len()
    }

    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_clamps_to_capacity() {
        let mut buf = InputBuffer::new(4).with_pts(42);
        assert_eq!(buf.fill(&[1, 2, 3]), 3);
        assert_eq!(buf.fill(&[4, 5, 6]), 1);
        assert_eq!(buf.fill(&[7]), 0);
        assert_eq!(buf.filled_len(), 4);
        assert_eq!(buf.pts, 42);
        assert_eq!(&buf.freeze()[..], &[1, 2, 3, 4]);
    }
}
