use crate::config::LatencyConfig;
use crate::format::pes::PTS_HZ;
use std::collections::VecDeque;

/// Clock scale per correction level. HDMI allows 1000ppm of deviation, but
/// the mild levels stay at 150ppm to avoid audio drops on some receivers.
const LIVE_SPEEDS: [f32; 5] = [0.999, 0.99985, 1.000, 1.00015, 1.001];

/// Target latency relative to the first averaged window.
const TARGET_FACTOR: f64 = 1.4;

const TICKS_PER_MS: i64 = PTS_HZ / 1000;

/// Clock rate correction level, slowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LiveSpeed {
    NegMaxCorrection,
    NegCorrection,
    #[default]
    NoCorrection,
    PosCorrection,
    PosMaxCorrection,
}

impl LiveSpeed {
    pub fn clock_scale(self) -> f32 {
        LIVE_SPEEDS[self as usize]
    }

    fn symbol(self) -> &'static str {
        match self {
            LiveSpeed::NegMaxCorrection => "--|  ",
            LiveSpeed::NegCorrection => " -|  ",
            LiveSpeed::NoCorrection => "  |  ",
            LiveSpeed::PosCorrection => "  |+ ",
            LiveSpeed::PosMaxCorrection => "  |++",
        }
    }
}

/// Moving average of presentation latency with a banded rate controller.
///
/// Latency is the distance between an incoming timestamp and the hardware
/// clock. The first full window fixes the target; afterwards the average is
/// compared against bands around it. Leaving the inner band switches to a
/// correction, and a correction is only dropped once the average crosses
/// back over the target itself.
#[derive(Debug, Clone)]
pub struct LatencyCorrector {
    config: LatencyConfig,
    samples: VecDeque<i64>,
    preroll_left: usize,
    target: Option<i64>,
    level: LiveSpeed,
    pos_max_corrections: u32,
    neg_max_corrections: u32,
}

impl LatencyCorrector {
    pub fn new(config: LatencyConfig) -> Self {
        let window = config.window.max(1);
        Self {
            config: LatencyConfig { window, ..config },
            samples: VecDeque::with_capacity(window),
            preroll_left: config.preroll,
            target: None,
            level: LiveSpeed::NoCorrection,
            pos_max_corrections: 0,
            neg_max_corrections: 0,
        }
    }

    /// Latency in milliseconds between `pts` and the clock, if meaningful.
    pub fn sample_from(pts: i64, clock: i64) -> Option<i64> {
        if pts == 0 || clock == 0 || pts <= clock {
            return None;
        }
        Some((pts - clock) / TICKS_PER_MS)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.preroll_left = self.config.preroll;
        self.target = None;
        self.level = LiveSpeed::NoCorrection;
        self.pos_max_corrections = 0;
        self.neg_max_corrections = 0;
    }

    pub fn level(&self) -> LiveSpeed {
        self.level
    }

    pub fn target(&self) -> Option<i64> {
        self.target
    }

    /// Number of times the fast and slow limits were hit since the last
    /// reset.
    pub fn max_corrections(&self) -> (u32, u32) {
        (self.pos_max_corrections, self.neg_max_corrections)
    }

    /// Average of the current window, once it is full.
    pub fn average(&self) -> Option<i64> {
        (self.samples.len() == self.config.window)
            .then(|| self.samples.iter().sum::<i64>() / self.config.window as i64)
    }

    /// Adds a latency sample in milliseconds. Returns the correction level
    /// to apply once the window is full.
    pub fn push_sample(&mut self, latency_ms: i64) -> Option<LiveSpeed> {
        if self.preroll_left > 0 {
            self.preroll_left -= 1;
            return None;
        }

        if self.samples.len() == self.config.window {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);

        let average = self.average()?;
        let target = match self.target {
            Some(target) if target > 0 => target,
            _ => {
                let target = (TARGET_FACTOR * average as f64) as i64;
                self.target = Some(target);
                target
            }
        };

        let old = self.level;
        self.evaluate(average as f64, target as f64);

        if old != self.level {
            log::debug!(
                "latency = {:4}ms, target = {:4}ms, corr = {}, max neg/pos corr = {}/{}",
                average,
                target,
                self.level.symbol(),
                self.neg_max_corrections,
                self.pos_max_corrections
            );
        }

        Some(self.level)
    }

    fn evaluate(&mut self, average: f64, target: f64) {
        if average > 2.0 * target {
            if self.level < LiveSpeed::PosMaxCorrection {
                self.level = LiveSpeed::PosMaxCorrection;
                self.pos_max_corrections += 1;
                log::debug!("latency too big, speeding up...");
            }
        } else if average < 0.5 * target {
            if self.level > LiveSpeed::NegMaxCorrection {
                self.level = LiveSpeed::NegMaxCorrection;
                self.neg_max_corrections += 1;
                log::debug!("latency too small, slowing down...");
            }
        } else if average > 1.1 * target {
            if self.level < LiveSpeed::PosMaxCorrection {
                self.level = LiveSpeed::PosCorrection;
            }
        } else if average < 0.9 * target {
            if self.level > LiveSpeed::NegMaxCorrection {
                self.level = LiveSpeed::NegCorrection;
            }
        } else if average > target {
            if self.level < LiveSpeed::NoCorrection {
                self.level = LiveSpeed::NoCorrection;
            }
        } else if average < target {
            if self.level > LiveSpeed::NoCorrection {
                self.level = LiveSpeed::NoCorrection;
            }
        } else {
            self.level = LiveSpeed::NoCorrection;
        }
    }
}

impl Default for LatencyCorrector {
    fn default() -> Self {
        Self::new(LatencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corrector() -> LatencyCorrector {
        LatencyCorrector::new(LatencyConfig {
            window: 8,
            preroll: 2,
        })
    }

    fn fill(corrector: &mut LatencyCorrector, latency: i64, count: usize) -> Option<LiveSpeed> {
        let mut level = None;
        for _ in 0..count {
            level = corrector.push_sample(latency);
        }
        level
    }

    #[test]
    fn test_sample_guards() {
        assert_eq!(LatencyCorrector::sample_from(0, 1000), None);
        assert_eq!(LatencyCorrector::sample_from(1000, 0), None);
        assert_eq!(LatencyCorrector::sample_from(1000, 1000), None);
        assert_eq!(LatencyCorrector::sample_from(900, 1000), None);
        assert_eq!(LatencyCorrector::sample_from(90_000 + 9_000, 90_000), Some(100));
    }

    #[test]
    fn test_no_action_until_window_full() {
        let mut corrector = corrector();
        // preroll plus window - 1 samples stay silent
        assert_eq!(fill(&mut corrector, 100, 2 + 7), None);
        assert_eq!(corrector.target(), None);

        let level = corrector.push_sample(100);
        assert!(level.is_some());
        assert_eq!(corrector.target(), Some(140));
    }

    #[test]
    fn test_steady_state_below_target_slows_down() {
        let mut corrector = corrector();
        let level = fill(&mut corrector, 100, 10);
        assert_eq!(level, Some(LiveSpeed::NegCorrection));
        assert_eq!(LiveSpeed::NegCorrection.clock_scale(), 0.99985);
    }

    #[test]
    fn test_converges_to_no_correction_at_target() {
        let mut corrector = corrector();
        fill(&mut corrector, 100, 10);
        let target = corrector.target().unwrap();

        // average climbs towards the target but stays below it: keep slowing
        let level = fill(&mut corrector, target, 7);
        assert_eq!(level, Some(LiveSpeed::NegCorrection));

        let level = corrector.push_sample(target);
        assert_eq!(corrector.average(), Some(target));
        assert_eq!(level, Some(LiveSpeed::NoCorrection));

        for _ in 0..50 {
            assert_eq!(corrector.push_sample(target), Some(LiveSpeed::NoCorrection));
        }
        assert_eq!(corrector.target(), Some(target));
    }

    #[test]
    fn test_hysteresis_above_target() {
        let mut corrector = corrector();
        fill(&mut corrector, 100, 10);
        let target = corrector.target().unwrap();

        // mild overshoot speeds up
        let level = fill(&mut corrector, target * 12 / 10, 8);
        assert_eq!(level, Some(LiveSpeed::PosCorrection));

        // back inside the band but still above target: keep correcting
        let level = fill(&mut corrector, target * 105 / 100, 8);
        assert_eq!(level, Some(LiveSpeed::PosCorrection));

        // below target: correction off
        let level = fill(&mut corrector, target * 95 / 100, 8);
        assert_eq!(level, Some(LiveSpeed::NoCorrection));
    }

    #[test]
    fn test_max_corrections_counted_once() {
        let mut corrector = corrector();
        fill(&mut corrector, 100, 10);
        let target = corrector.target().unwrap();

        let level = fill(&mut corrector, target * 3, 20);
        assert_eq!(level, Some(LiveSpeed::PosMaxCorrection));
        assert_eq!(corrector.max_corrections(), (1, 0));
        assert_eq!(LiveSpeed::PosMaxCorrection.clock_scale(), 1.001);

        // mild overshoot never weakens a max correction
        let level = fill(&mut corrector, target * 12 / 10, 8);
        assert_eq!(level, Some(LiveSpeed::PosMaxCorrection));

        let level = fill(&mut corrector, target / 3, 8);
        assert_eq!(level, Some(LiveSpeed::NegMaxCorrection));
        assert_eq!(corrector.max_corrections(), (1, 1));
    }

    #[test]
    fn test_reset() {
        let mut corrector = corrector();
        fill(&mut corrector, 100, 10);
        fill(&mut corrector, 1000, 8);
        assert_ne!(corrector.level(), LiveSpeed::NoCorrection);

        corrector.reset();
        assert_eq!(corrector.level(), LiveSpeed::NoCorrection);
        assert_eq!(corrector.target(), None);
        assert_eq!(corrector.average(), None);
        assert_eq!(corrector.max_corrections(), (0, 0));
        assert_eq!(fill(&mut corrector, 500, 9), None);
        corrector.push_sample(500);
        assert_eq!(corrector.target(), Some(700));
    }
}
