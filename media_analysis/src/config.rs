use crate::analyzer::{Aggregation, DEFAULT_FRAME_STRIDE};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub prediction_service: PredictionServiceConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
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
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictionServiceConfig {
    pub host: String,
    pub port: u16,
}

impl PredictionServiceConfig {
    pub fn get_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_directory")]
    pub directory: PathBuf,
}

fn default_upload_directory() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            directory: default_upload_directory(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_frame_stride")]
    pub frame_stride: u64,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default = "default_persist_frames")]
    pub persist_frames: bool,
}

fn default_frame_stride() -> u64 {
    DEFAULT_FRAME_STRIDE
}

fn default_persist_frames() -> bool {
    true
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_stride: default_frame_stride(),
            aggregation: Aggregation::default(),
            persist_frames: default_persist_frames(),
        }
    }
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_stride == 0 {
            return Err("video.frame_stride must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_translation_url")]
    pub url: String,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_translation_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_translation_timeout_secs() -> u64 {
    10
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_translation_url(),
            timeout_secs: default_translation_timeout_secs(),
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

#[derive(Debug, Deserialize, Clone)]
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
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;
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
            config::Environment::with_prefix("MA")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    config.video.validate().map_err(config::ConfigError::Message)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_defaults() {
        let video = VideoConfig::default();

        assert_eq!(video.frame_stride, 10);
        assert_eq!(video.aggregation, Aggregation::Frames);
        assert!(video.persist_frames);
        assert!(video.validate().is_ok());
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        let video = VideoConfig {
            frame_stride: 0,
            ..VideoConfig::default()
        };

        assert!(video.validate().is_err());
    }

    #[test]
    fn test_addresses() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: default_max_upload_bytes(),
        };
        let prediction = PredictionServiceConfig {
            host: "localhost".to_string(),
            port: 50051,
        };

        assert_eq!(server.get_address(), "127.0.0.1:8000");
        assert_eq!(prediction.get_address(), "http://localhost:50051");
    }
}
