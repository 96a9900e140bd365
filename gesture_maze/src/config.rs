use crate::direction::{Direction, GestureMap, GesturePreset};
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    pub url: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Unset means the request may wait indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_jpeg_quality() -> u8 {
    80
}

impl ClassifierConfig {
    pub fn get_request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleConfig {
    #[serde(default = "default_throttle_interval_ms")]
    pub interval_ms: u64,
}

fn default_throttle_interval_ms() -> u64 {
    1000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_throttle_interval_ms(),
        }
    }
}

impl ThrottleConfig {
    pub fn get_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_keyup_delay_ms")]
    pub keyup_delay_ms: u64,
    #[serde(default = "default_log_keys")]
    pub log_keys: bool,
}

fn default_keyup_delay_ms() -> u64 {
    100
}

fn default_log_keys() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            keyup_delay_ms: default_keyup_delay_ms(),
            log_keys: default_log_keys(),
        }
    }
}

impl DispatchConfig {
    pub fn get_keyup_delay(&self) -> Duration {
        Duration::from_millis(self.keyup_delay_ms)
    }
}

/// Either a named preset or an explicit label table. The table wins when
/// both are given.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GestureConfig {
    #[serde(default, deserialize_with = "deserialize_preset")]
    pub preset: Option<GesturePreset>,
    #[serde(default)]
    pub table: Option<HashMap<String, Direction>>,
}

fn deserialize_preset<'de, D>(deserializer: D) -> Result<Option<GesturePreset>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| s.try_into().map_err(serde::de::Error::custom))
        .transpose()
}

impl GestureConfig {
    pub fn build_map(&self) -> Result<GestureMap, String> {
        match &self.table {
            Some(table) if table.is_empty() => Err("gesture table must not be empty".into()),
            Some(table) => Ok(GestureMap::new(table.iter().map(|(k, v)| (k, *v)))),
            None => Ok(GestureMap::from_preset(self.preset.unwrap_or_default())),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Webcam,
    ImageDir,
}

#[derive(Clone, Deserialize, Debug)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u64,
    #[serde(default)]
    pub image_dir: Option<PathBuf>,
    #[serde(default = "default_loop_images")]
    pub loop_images: bool,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u64,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u64 {
    30
}

fn default_loop_images() -> bool {
    true
}

fn default_max_consecutive_failures() -> u64 {
    10
}

fn fps_to_delay_ms(fps: u64) -> u64 {
    (1000.0 / fps.max(1) as f64).round() as u64
}

impl SourceConfig {
    pub fn get_frame_delay(&self) -> Duration {
        Duration::from_millis(fps_to_delay_ms(self.fps))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kind == SourceKind::ImageDir {
            match &self.image_dir {
                None => return Err("source.image_dir is required for the image_dir source".into()),
                Some(dir) if !dir.is_dir() => {
                    return Err(format!("Image directory not found: {:?}", dir))
                }
                Some(_) => {}
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err("source.width and source.height must be non-zero".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DetectorConfig {
    /// Crop submitted frames to the first hand, grown by this fraction of its
    /// size. Unset submits the whole frame.
    #[serde(default)]
    pub crop_margin: Option<f32>,
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.crop_margin {
            Some(margin) if !margin.is_finite() || margin < 0.0 => Err(format!(
                "detector.crop_margin must be a non-negative number, got {}",
                margin
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("GM")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    config.validate().map_err(config::ConfigError::Message)?;

    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;
        self.detector.validate()?;
        self.gestures.build_map()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(yaml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Config>()
            .unwrap()
    }

    const MINIMAL: &str = r#"
log_level: info
server:
  host: 127.0.0.1
  port: 8080
classifier:
  url: http://localhost:8000/predict/predict
source:
  kind: webcam
"#;

    #[test]
    fn test_defaults() {
        let config = parse(MINIMAL);

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.server.get_address(), "127.0.0.1:8080");
        assert_eq!(config.classifier.jpeg_quality, 80);
        assert_eq!(config.classifier.get_request_timeout(), None);
        assert_eq!(config.throttle.get_interval(), Duration::from_millis(1000));
        assert_eq!(config.dispatch.get_keyup_delay(), Duration::from_millis(100));
        assert_eq!(config.source.kind, SourceKind::Webcam);
        assert_eq!((config.source.width, config.source.height), (640, 480));
        assert_eq!(config.source.get_frame_delay(), Duration::from_millis(33));
        assert_eq!(config.detector.crop_margin, None);

        let map = config.gestures.build_map().unwrap();
        assert_eq!(map.lookup("one"), Some(Direction::Up));
    }

    #[test]
    fn test_gesture_preset_and_table() {
        let yaml = format!("{}gestures:\n  preset: thumbs\n", MINIMAL);
        let map = parse(&yaml).gestures.build_map().unwrap();
        assert_eq!(map.lookup("THUMBS_UP"), Some(Direction::Up));

        let yaml = format!(
            "{}gestures:\n  preset: thumbs\n  table:\n    Palm: left\n    fist: down\n",
            MINIMAL
        );
        let map = parse(&yaml).gestures.build_map().unwrap();
        assert_eq!(map.lookup("palm"), Some(Direction::Left));
        assert_eq!(map.lookup("fist"), Some(Direction::Down));
        assert_eq!(map.lookup("thumbs_up"), None);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let yaml = MINIMAL.replace("log_level: info", "log_level: trace");
        let result = config::Config::builder()
            .add_source(File::from_str(&yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Config>();

        assert!(result.is_err());
    }

    #[test]
    fn test_image_dir_source_requires_directory() {
        let yaml = MINIMAL.replace("kind: webcam", "kind: image_dir");
        let config = parse(&yaml);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_crop_margin_must_be_non_negative() {
        let config = parse(&format!("{}detector:\n  crop_margin: 0.2\n", MINIMAL));
        assert!(config.validate().is_ok());

        let config = parse(&format!("{}detector:\n  crop_margin: -0.5\n", MINIMAL));
        assert!(config.validate().is_err());

        let mut config = parse(MINIMAL);
        config.detector.crop_margin = Some(f32::NAN);
        assert!(config.validate().is_err());
    }
}
