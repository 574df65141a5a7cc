use super::PlaybackState;
use crate::format::pes::pts_diff;

/// Score added for a timestamp that moved backwards.
pub const BACKWARD_STEP: i32 = -1;

/// Score added for a timestamp that moved forwards. Weighted higher since
/// forward motion shows through the decoder's frame reordering sooner.
pub const FORWARD_STEP: i32 = 2;

/// Scores in this range leave the direction undecided.
pub const UNDECIDED: std::ops::RangeInclusive<i32> = -2..=3;

/// Returns true for the fast codes that don't say which way to play.
pub fn is_ambiguous(code: u8) -> bool {
    matches!(code, 1 | 3 | 6)
}

/// Returns true for the slow codes that imply forward play.
pub fn is_slow_forward(code: u8) -> bool {
    matches!(code, 2 | 4 | 8)
}

/// Tracks a trick-speed request until its direction is known.
#[derive(Debug, Clone, Default)]
pub struct TrickTracker {
    pending: Option<u8>,
    score: i32,
    last_audio_pts: Option<i64>,
    last_video_pts: Option<i64>,
}

impl TrickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pending speed code awaiting a direction.
    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    /// Starts a new request. Returns the state to apply right away, or
    /// `None` if the direction has to be found from the stream first.
    pub fn request(&mut self, code: u8) -> Option<PlaybackState> {
        self.reset();

        if is_ambiguous(code) {
            self.pending = Some(code);
            None
        } else {
            Some(PlaybackState::from_trick_code(code, is_slow_forward(code)))
        }
    }

    /// Feeds an audio timestamp. Returns the resolved state once decided.
    pub fn track_audio(&mut self, pts: i64) -> Option<PlaybackState> {
        self.pending?;
        let last = self.last_audio_pts.replace(pts)?;
        self.feed(pts_diff(last, pts))
    }

    /// Feeds a video timestamp. Returns the resolved state once decided.
    pub fn track_video(&mut self, pts: i64) -> Option<PlaybackState> {
        self.pending?;
        let last = self.last_video_pts.replace(pts)?;
        self.feed(pts_diff(last, pts))
    }

    fn feed(&mut self, diff: i64) -> Option<PlaybackState> {
        log::trace!("pts delta {} while resolving trick speed", diff);

        if diff < 0 {
            self.score += BACKWARD_STEP;
        } else if diff > 0 {
            self.score += FORWARD_STEP;
        }

        if UNDECIDED.contains(&self.score) {
            return None;
        }

        let code = self.pending.take()?;
        let state = PlaybackState::from_trick_code(code, self.score > 0);
        self.reset();
        Some(state)
    }
}
