//! Configuration file handling for cloakcam.
//!
//! Loads configuration from `~/.config/cloakcam/config.toml` or a custom
//! path. Every section is optional; defaults match the stock detection
//! and recording settings.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::background::BackgroundSettings;
use crate::camera::{CameraSettings, Resolution};
use crate::color::{ColorProfile, ColorRegistry, Hsv, HsvRange};
use crate::mask::MaskSettings;
use crate::recorder::RecorderSettings;

/// Configuration file structure for cloakcam.
/// Loaded from ~/.config/cloakcam/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Extra or overriding cloak colors, keyed by name.
    #[serde(default)]
    pub colors: BTreeMap<String, ColorRangeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    /// Camera device index (0 = built-in, 1 = external)
    #[serde(default)]
    pub device: u32,
    /// Seconds to wait after opening the camera for auto-exposure to settle
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    #[serde(default = "default_capture_width")]
    pub width: u32,
    #[serde(default = "default_capture_height")]
    pub height: u32,
    #[serde(default = "default_capture_fps")]
    pub fps: u32,
    /// Mirror live frames horizontally (selfie view)
    #[serde(default = "default_true")]
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            warmup_secs: default_warmup_secs(),
            width: default_capture_width(),
            height: default_capture_height(),
            fps: default_capture_fps(),
            mirror: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundConfig {
    /// Seconds to wait before reading, so the user can leave the frame
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Frames to read per capture; only the last one is kept
    #[serde(default = "default_background_frames")]
    pub frames: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            frames: default_background_frames(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    #[serde(default = "default_open_kernel")]
    pub open_kernel: u32,
    #[serde(default = "default_close_kernel")]
    pub close_kernel: u32,
    #[serde(default = "default_dilate_kernel")]
    pub dilate_kernel: u32,
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            open_kernel: default_open_kernel(),
            close_kernel: default_close_kernel(),
            dilate_kernel: default_dilate_kernel(),
            dilate_iterations: default_dilate_iterations(),
            blur_kernel: default_blur_kernel(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_fps")]
    pub fps: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_container")]
    pub container: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: default_recording_fps(),
            codec: default_codec(),
            container: default_container(),
        }
    }
}

/// One cloak color entry: an HSV box, with an optional second box for
/// hues that wrap around the hue circle.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorRangeConfig {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
    #[serde(default)]
    pub lower2: Option<[u8; 3]>,
    #[serde(default)]
    pub upper2: Option<[u8; 3]>,
}

fn default_true() -> bool {
    true
}
fn default_warmup_secs() -> u64 {
    3
}
fn default_capture_width() -> u32 {
    640
}
fn default_capture_height() -> u32 {
    480
}
fn default_capture_fps() -> u32 {
    30
}
fn default_settle_secs() -> u64 {
    2
}
fn default_background_frames() -> u32 {
    30
}
fn default_open_kernel() -> u32 {
    3
}
fn default_close_kernel() -> u32 {
    5
}
fn default_dilate_kernel() -> u32 {
    3
}
fn default_dilate_iterations() -> u32 {
    2
}
fn default_blur_kernel() -> u32 {
    5
}
fn default_recording_fps() -> u32 {
    20
}
fn default_codec() -> String {
    "mpeg4".to_string()
}
fn default_container() -> String {
    "avi".to_string()
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or
    /// contains invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        let config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            toml::from_str::<Config>(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?
        } else {
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (used by tests).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<Config>(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("processing.open_kernel", self.processing.open_kernel),
            ("processing.close_kernel", self.processing.close_kernel),
            ("processing.dilate_kernel", self.processing.dilate_kernel),
            ("processing.blur_kernel", self.processing.blur_kernel),
        ] {
            if value % 2 == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("kernel size must be odd, got {}", value),
                });
            }
        }
        if self.background.frames == 0 {
            return Err(ConfigError::InvalidValue {
                field: "background.frames".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.recording.fps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recording.fps".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (name, entry) in &self.colors {
            entry.check(name)?;
        }
        Ok(())
    }

    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            device_index: self.camera.device,
            resolution: Resolution {
                width: self.camera.width,
                height: self.camera.height,
            },
            fps: self.camera.fps,
        }
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.camera.warmup_secs)
    }

    pub fn background_settings(&self) -> BackgroundSettings {
        BackgroundSettings {
            settle_delay: Duration::from_secs(self.background.settle_secs),
            frames: self.background.frames,
        }
    }

    pub fn mask_settings(&self) -> MaskSettings {
        MaskSettings {
            open_kernel: self.processing.open_kernel,
            close_kernel: self.processing.close_kernel,
            dilate_kernel: self.processing.dilate_kernel,
            dilate_iterations: self.processing.dilate_iterations,
            blur_kernel: self.processing.blur_kernel,
        }
    }

    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            fps: self.recording.fps,
            codec: self.recording.codec.clone(),
            container: self.recording.container.clone(),
        }
    }

    /// The built-in color table overlaid with the `[colors.*]` entries.
    pub fn color_registry(&self) -> ColorRegistry {
        let mut registry = ColorRegistry::builtin();
        for (name, entry) in &self.colors {
            registry.insert(ColorProfile::new(name.clone(), entry.ranges()));
        }
        registry
    }
}

impl ColorRangeConfig {
    fn check(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: format!("colors.{}", name),
            reason,
        };

        if self.lower2.is_some() != self.upper2.is_some() {
            return Err(invalid(
                "lower2 and upper2 must be given together".to_string(),
            ));
        }
        for bounds in [Some((self.lower, self.upper))]
            .into_iter()
            .chain([self.lower2.zip(self.upper2)])
            .flatten()
        {
            let (lower, upper) = bounds;
            if lower[0] > 180 || upper[0] > 180 {
                return Err(invalid(format!(
                    "hue bounds must be 0-180, got {}..{}",
                    lower[0], upper[0]
                )));
            }
            for i in 0..3 {
                if lower[i] > upper[i] {
                    return Err(invalid(format!(
                        "lower bound exceeds upper bound in channel {}",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    fn ranges(&self) -> Vec<HsvRange> {
        let mut ranges = vec![HsvRange::new(
            Hsv::new(self.lower[0], self.lower[1], self.lower[2]),
            Hsv::new(self.upper[0], self.upper[1], self.upper[2]),
        )];
        if let (Some(lower2), Some(upper2)) = (self.lower2, self.upper2) {
            ranges.push(HsvRange::new(
                Hsv::new(lower2[0], lower2[1], lower2[2]),
                Hsv::new(upper2[0], upper2[1], upper2[2]),
            ));
        }
        ranges
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid config value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    directories::ProjectDirs::from("com", "cloakcam", "cloakcam")
        .map(|d| d.config_dir().to_path_buf().join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/cloakcam/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.camera.device, 0);
        assert_eq!(config.camera.warmup_secs, 3);
        assert!(config.camera.mirror);
        assert_eq!(config.background.frames, 30);
        assert_eq!(config.background.settle_secs, 2);
        assert_eq!(config.processing.open_kernel, 3);
        assert_eq!(config.processing.close_kernel, 5);
        assert_eq!(config.processing.dilate_iterations, 2);
        assert_eq!(config.recording.fps, 20);
        assert_eq!(config.recording.codec, "mpeg4");
        assert_eq!(config.recording.container, "avi");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/cloakcam.toml"))).unwrap();
        assert_eq!(config.background.frames, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera]\ndevice = 2\nmirror = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.device, 2);
        assert!(!config.camera.mirror);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [[[").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{}", err).contains("parse"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::from_str(
            r#"
            [camera]
            device = 1
            warmup_secs = 1

            [recording]
            fps = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.device, 1);
        assert_eq!(config.camera.warmup_secs, 1);
        // Untouched sections keep defaults
        assert_eq!(config.background.frames, 30);
        assert_eq!(config.recording.fps, 30);
        assert_eq!(config.recording.codec, "mpeg4");
    }

    #[test]
    fn test_parse_custom_color() {
        let config = Config::from_str(
            r#"
            [colors.teal]
            lower = [80, 100, 50]
            upper = [100, 255, 255]
            "#,
        )
        .unwrap();
        let registry = config.color_registry();
        let teal = registry.lookup("teal");
        assert_eq!(teal.name, "teal");
        assert_eq!(teal.ranges.len(), 1);
        assert_eq!(teal.ranges[0].lower.h, 80);
        // Built-ins still present
        assert_eq!(registry.lookup("green").name, "green");
    }

    #[test]
    fn test_parse_two_band_color() {
        let config = Config::from_str(
            r#"
            [colors.crimson]
            lower = [0, 150, 80]
            upper = [8, 255, 255]
            lower2 = [172, 150, 80]
            upper2 = [180, 255, 255]
            "#,
        )
        .unwrap();
        let registry = config.color_registry();
        assert_eq!(registry.lookup("crimson").ranges.len(), 2);
    }

    #[test]
    fn test_reject_even_kernel() {
        let err = Config::from_str(
            r#"
            [processing]
            open_kernel = 4
            "#,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("odd"));
    }

    #[test]
    fn test_reject_hue_out_of_range() {
        let err = Config::from_str(
            r#"
            [colors.bad]
            lower = [0, 0, 0]
            upper = [200, 255, 255]
            "#,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("hue"));
    }

    #[test]
    fn test_reject_unpaired_second_band() {
        let err = Config::from_str(
            r#"
            [colors.bad]
            lower = [0, 0, 0]
            upper = [10, 255, 255]
            lower2 = [170, 0, 0]
            "#,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("together"));
    }

    #[test]
    fn test_reject_zero_background_frames() {
        let err = Config::from_str(
            r#"
            [background]
            frames = 0
            "#,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("background.frames"));
    }

    #[test]
    fn test_reject_unknown_key() {
        assert!(Config::from_str("[camera]\nbogus = 1\n").is_err());
    }
}
