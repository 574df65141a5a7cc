use crate::{PlayError, Result};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::env;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::load());
}

const CONFIG_PATHS: [&str; 2] = ["./hwplay.conf", "./config.toml"];
const ENV_PREFIX: &str = "HWPLAY_";

const KEY_AUDIO_PORT: &str = "AudioPort";
const KEY_PASSTHROUGH: &str = "PassThrough";
const KEY_IGNORE_AUDIO_EDID: &str = "IgnoreAudioEDID";
const KEY_VIDEO_FRAMING: &str = "VideoFraming";
const KEY_RESOLUTION: &str = "Resolution";
const KEY_FRAME_RATE: &str = "FrameRate";
const KEY_ACCELERATED_OSD: &str = "AcceleratedOsd";

const KEYS: [&str; 7] = [
    KEY_AUDIO_PORT,
    KEY_PASSTHROUGH,
    KEY_IGNORE_AUDIO_EDID,
    KEY_VIDEO_FRAMING,
    KEY_RESOLUTION,
    KEY_FRAME_RATE,
    KEY_ACCELERATED_OSD,
];

fn out_of_range(key: &str, value: i32) -> PlayError {
    PlayError::Config(format!("{} out of range: {}", key, value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioPort {
    #[default]
    Analog,
    Hdmi,
}

impl TryFrom<i32> for AudioPort {
    type Error = PlayError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(AudioPort::Analog),
            1 => Ok(AudioPort::Hdmi),
            _ => Err(out_of_range(KEY_AUDIO_PORT, value)),
        }
    }
}

/// How video is fitted into the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoFraming {
    /// Letter-/pillarbox, keep the whole picture
    #[default]
    Box,
    /// Fill the frame, crop the excess
    Crop,
    /// Fill the frame, ignore the aspect ratio
    Stretch,
}

impl VideoFraming {
    /// `(letterbox, stretch)` flags for the decoder's display mode.
    pub fn display_mode(self) -> (bool, bool) {
        match self {
            VideoFraming::Box => (false, false),
            VideoFraming::Crop => (true, false),
            VideoFraming::Stretch => (true, true),
        }
    }
}

impl TryFrom<i32> for VideoFraming {
    type Error = PlayError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(VideoFraming::Box),
            1 => Ok(VideoFraming::Crop),
            2 => Ok(VideoFraming::Stretch),
            _ => Err(out_of_range(KEY_VIDEO_FRAMING, value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoResolution {
    #[default]
    Default,
    FollowVideo,
    R720x480,
    R720x576,
    R1280x720,
    R1920x1080,
}

impl TryFrom<i32> for VideoResolution {
    type Error = PlayError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(VideoResolution::Default),
            1 => Ok(VideoResolution::FollowVideo),
            2 => Ok(VideoResolution::R720x480),
            3 => Ok(VideoResolution::R720x576),
            4 => Ok(VideoResolution::R1280x720),
            5 => Ok(VideoResolution::R1920x1080),
            _ => Err(out_of_range(KEY_RESOLUTION, value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoFrameRate {
    #[default]
    Default,
    FollowVideo,
    P24,
    P25,
    P30,
    I50,
    P50,
    I60,
    P60,
}

impl TryFrom<i32> for VideoFrameRate {
    type Error = PlayError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(VideoFrameRate::Default),
            1 => Ok(VideoFrameRate::FollowVideo),
            2 => Ok(VideoFrameRate::P24),
            3 => Ok(VideoFrameRate::P25),
            4 => Ok(VideoFrameRate::P30),
            5 => Ok(VideoFrameRate::I50),
            6 => Ok(VideoFrameRate::P50),
            7 => Ok(VideoFrameRate::I60),
            8 => Ok(VideoFrameRate::P60),
            _ => Err(out_of_range(KEY_FRAME_RATE, value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioSettings {
    pub port: AudioPort,
    pub passthrough: bool,
    pub ignore_edid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoSettings {
    pub framing: VideoFraming,
    pub resolution: VideoResolution,
    pub frame_rate: VideoFrameRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsdSettings {
    pub accelerated: bool,
}

/// Persisted device setup. The playback core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub audio: AudioSettings,
    pub video: VideoSettings,
    pub osd: OsdSettings,
}

/// Which setting groups differ between two configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupChange {
    pub audio: bool,
    pub video: bool,
    pub osd: bool,
}

impl SetupChange {
    pub fn between(old: &Config, new: &Config) -> Self {
        Self {
            audio: old.audio != new.audio,
            video: old.video != new.video,
            osd: old.osd != new.osd,
        }
    }

    pub fn any(&self) -> bool {
        self.audio || self.video || self.osd
    }
}

impl Config {
    /// Defaults, overridden by `HWPLAY_<KEY>` environment variables, then by
    /// the first config file found.
    pub fn load() -> Self {
        let mut config = Config::default();

        for key in KEYS {
            if let Ok(value) = env::var(format!("{}{}", ENV_PREFIX, key.to_uppercase())) {
                if let Err(e) = config.parse(key, &value) {
                    log::warn!("ignoring {}{}: {}", ENV_PREFIX, key.to_uppercase(), e);
                }
            }
        }

        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                config.apply_lines(&content);
                break;
            }
        }

        config
    }

    /// Applies one stored setting. Returns `Ok(false)` for unknown keys.
    pub fn parse(&mut self, name: &str, value: &str) -> Result<bool> {
        let value: i32 = value.trim().trim_matches('"').parse()?;

        if name.eq_ignore_ascii_case(KEY_AUDIO_PORT) {
            self.audio.port = AudioPort::try_from(value)?;
        } else if name.eq_ignore_ascii_case(KEY_PASSTHROUGH) {
            self.audio.passthrough = value != 0;
        } else if name.eq_ignore_ascii_case(KEY_IGNORE_AUDIO_EDID) {
            self.audio.ignore_edid = value != 0;
        } else if name.eq_ignore_ascii_case(KEY_VIDEO_FRAMING) {
            self.video.framing = VideoFraming::try_from(value)?;
        } else if name.eq_ignore_ascii_case(KEY_RESOLUTION) {
            self.video.resolution = VideoResolution::try_from(value)?;
        } else if name.eq_ignore_ascii_case(KEY_FRAME_RATE) {
            self.video.frame_rate = VideoFrameRate::try_from(value)?;
        } else if name.eq_ignore_ascii_case(KEY_ACCELERATED_OSD) {
            self.osd.accelerated = value != 0;
        } else {
            return Ok(false);
        }

        Ok(true)
    }

    /// Applies `Key = value` lines, skipping blanks and `#` comments.
    /// Returns the number of settings taken.
    pub fn apply_lines(&mut self, content: &str) -> usize {
        let mut applied = 0;
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                log::warn!("malformed setup line: {}", line);
                continue;
            };
            match self.parse(name.trim(), value) {
                Ok(true) => applied += 1,
                Ok(false) => log::debug!("unknown setup key {}", name.trim()),
                Err(e) => log::warn!("ignoring setup line '{}': {}", line, e),
            }
        }
        applied
    }

    /// Settings as `(key, value)` pairs in storage format.
    pub fn entries(&self) -> Vec<(&'static str, i32)> {
        vec![
            (KEY_AUDIO_PORT, self.audio.port as i32),
            (KEY_PASSTHROUGH, self.audio.passthrough as i32),
            (KEY_IGNORE_AUDIO_EDID, self.audio.ignore_edid as i32),
            (KEY_VIDEO_FRAMING, self.video.framing as i32),
            (KEY_RESOLUTION, self.video.resolution as i32),
            (KEY_FRAME_RATE, self.video.frame_rate as i32),
            (KEY_ACCELERATED_OSD, self.osd.accelerated as i32),
        ]
    }
}

/// Returns the current process-wide setup.
pub fn get() -> Config {
    CONFIG.read().clone()
}

/// Re-reads environment and config file.
pub fn reload() {
    let new_config = Config::load();
    *CONFIG.write() = new_config;
}

/// Replaces the process-wide setup and reports what changed.
pub fn set(config: Config) -> SetupChange {
    let mut current = CONFIG.write();
    let change = SetupChange::between(&current, &config);
    *current = config;
    change
}

/// Writes a config file with the default settings if it doesn't exist.
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> Result<()> {
    if !path.as_ref().exists() {
        let mut template = String::from("# hwplay setup\n# Key = value, one per line.\n\n");
        for (key, value) in Config::default().entries() {
            template.push_str(&format!("{} = {}\n", key, value));
        }
        fs::write(path, template)?;
    }
    Ok(())
}

/// Tuning of the live latency filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyConfig {
    /// Number of samples averaged
    pub window: usize,
    /// Samples discarded after a reset before the window starts filling
    pub preroll: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window: 64,
            preroll: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_known_keys() {
        let mut config = Config::default();
        assert!(config.parse("audioport", "1").unwrap());
        assert!(config.parse("PassThrough", "1").unwrap());
        assert!(config.parse("VideoFraming", " 2 ").unwrap());
        assert!(config.parse("FrameRate", "8").unwrap());

        assert_eq!(config.audio.port, AudioPort::Hdmi);
        assert!(config.audio.passthrough);
        assert_eq!(config.video.framing, VideoFraming::Stretch);
        assert_eq!(config.video.frame_rate, VideoFrameRate::P60);
    }

    #[test]
    fn test_parse_rejects() {
        let mut config = Config::default();
        assert!(!config.parse("Volume", "3").unwrap());
        assert!(matches!(
            config.parse("Resolution", "abc"),
            Err(PlayError::ParseInt(_))
        ));
        assert!(matches!(
            config.parse("Resolution", "6"),
            Err(PlayError::Config(_))
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_apply_lines_and_entries() {
        let mut config = Config::default();
        let applied = config.apply_lines(
            "# comment\nResolution = 5\n\nIgnoreAudioEDID=1\nbogus line\nVideoFraming = 9\n",
        );
        assert_eq!(applied, 2);
        assert_eq!(config.video.resolution, VideoResolution::R1920x1080);
        assert!(config.audio.ignore_edid);

        let mut copy = Config::default();
        for (key, value) in config.entries() {
            assert!(copy.parse(key, &value.to_string()).unwrap());
        }
        assert_eq!(copy, config);
    }

    #[test]
    fn test_setup_change() {
        let old = Config::default();
        let mut new = old.clone();
        assert!(!SetupChange::between(&old, &new).any());

        new.video.framing = VideoFraming::Crop;
        new.osd.accelerated = true;
        let change = SetupChange::between(&old, &new);
        assert_eq!(
            change,
            SetupChange {
                audio: false,
                video: true,
                osd: true
            }
        );
    }

    #[test]
    fn test_global_set_reports_change() {
        let original = get();
        let mut changed = original.clone();
        changed.audio.passthrough = !changed.audio.passthrough;

        let change = set(changed.clone());
        assert!(change.audio);
        assert!(!change.video);
        assert_eq!(get(), changed);

        set(original);
    }

    #[test]
    fn test_display_modes() {
        assert_eq!(VideoFraming::Box.display_mode(), (false, false));
        assert_eq!(VideoFraming::Crop.display_mode(), (true, false));
        assert_eq!(VideoFraming::Stretch.display_mode(), (true, true));
    }

    #[test]
    fn test_config_template() {
        let path = env::temp_dir().join(format!("hwplay-template-{}.conf", std::process::id()));
        let _ = fs::remove_file(&path);

        create_default_config_template(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut config = Config::default();
        assert_eq!(config.apply_lines(&content), 7);
        assert_eq!(config, Config::default());

        fs::remove_file(&path).unwrap();
    }
}
