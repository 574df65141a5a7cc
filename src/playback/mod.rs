//! # Playback Timing
//!
//! Speed and direction state of the presentation clock:
//!
//! - [`PlaybackState`]: direction plus one of eight speed steps, mapped to
//!   a fixed table of clock scale factors
//! - [`TrickTracker`]: resolves trick-speed requests whose direction the
//!   player leaves open by watching timestamp deltas
//! - [`LatencyCorrector`]: keeps the live buffering latency stable with
//!   small clock rate corrections

/// Live latency measurement and clock rate correction
pub mod latency;

/// Trick-speed request handling and direction detection
pub mod trick;

pub use latency::{LatencyCorrector, LiveSpeed};
pub use trick::TrickTracker;

use std::fmt;

/// Clock scale per direction and speed step, as the player's trick modes
/// define them.
const PLAYBACK_SPEEDS: [[f32; 8]; 2] = [
    [0.0, 0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 12.0],
    [0.0, -0.125, -0.25, -0.5, -1.0, -2.0, -4.0, -12.0],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PlaybackSpeed {
    Pause,
    Slowest,
    Slower,
    Slow,
    #[default]
    Normal,
    Fast,
    Faster,
    Fastest,
}

impl PlaybackSpeed {
    /// Maps a player trick-speed code to a speed step. Slow codes exist in a
    /// forward (8/4/2) and a backward (63/48/24) flavour; the fast codes
    /// (6/3/1) are shared by both directions. Unknown codes play normally.
    pub fn from_trick_code(code: u8) -> Self {
        match code {
            8 | 63 => PlaybackSpeed::Slowest,
            4 | 48 => PlaybackSpeed::Slower,
            2 | 24 => PlaybackSpeed::Slow,
            6 => PlaybackSpeed::Fast,
            3 => PlaybackSpeed::Faster,
            1 => PlaybackSpeed::Fastest,
            _ => PlaybackSpeed::Normal,
        }
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackSpeed::Pause => "pause",
            PlaybackSpeed::Slowest => "slowest",
            PlaybackSpeed::Slower => "slower",
            PlaybackSpeed::Slow => "slow",
            PlaybackSpeed::Normal => "normal",
            PlaybackSpeed::Fast => "fast",
            PlaybackSpeed::Faster => "faster",
            PlaybackSpeed::Fastest => "fastest",
        })
    }
}

/// Direction and speed the presentation clock runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub direction: Direction,
    pub speed: PlaybackSpeed,
}

impl PlaybackState {
    /// State for an explicit direction and speed step.
    pub fn new(direction: Direction, speed: PlaybackSpeed) -> Self {
        Self { direction, speed }
    }

    /// State for a player trick-speed code in a known direction.
    pub fn from_trick_code(code: u8, forward: bool) -> Self {
        Self::new(
            Direction::from_forward(forward),
            PlaybackSpeed::from_trick_code(code),
        )
    }

    /// Normal forward play.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_normal(&self) -> bool {
        *self == Self::default()
    }

    /// Signed clock scale for this state.
    pub fn clock_scale(&self) -> f32 {
        PLAYBACK_SPEEDS[self.direction as usize][self.speed as usize]
    }

    /// Clock scale that halts the clock.
    pub fn paused_scale() -> f32 {
        PLAYBACK_SPEEDS[Direction::Forward as usize][PlaybackSpeed::Pause as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_normal_forward() {
        let state = PlaybackState::default();
        assert_eq!(state.direction, Direction::Forward);
        assert_eq!(state.speed, PlaybackSpeed::Normal);
        assert_eq!(state.clock_scale(), 1.0);
        assert!(state.is_normal());
    }

    #[test]
    fn test_trick_codes() {
        let cases = [
            (8, true, 0.125),
            (4, true, 0.25),
            (2, true, 0.5),
            (6, true, 2.0),
            (3, true, 4.0),
            (1, true, 12.0),
            (6, false, -2.0),
            (1, false, -12.0),
            (63, false, -0.125),
            (48, false, -0.25),
            (24, false, -0.5),
            (0, true, 1.0),
            (99, false, -1.0),
        ];

        for (code, forward, scale) in cases {
            let state = PlaybackState::from_trick_code(code, forward);
            assert_eq!(state.clock_scale(), scale, "code {} forward {}", code, forward);
        }
    }

    #[test]
    fn test_reset_and_pause() {
        let mut state = PlaybackState::from_trick_code(1, false);
        assert!(!state.is_normal());
        state.reset();
        assert!(state.is_normal());
        assert_eq!(PlaybackState::paused_scale(), 0.0);
    }
}
