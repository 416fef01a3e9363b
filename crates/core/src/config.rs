use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::SettingsError;

pub const DEFAULT_SENSOR_DEVICE_PATH: &str = "/sys/bus/w1/devices/28-3c01d607ca0a/w1_slave";
pub const DEFAULT_FILE_PATTERN: &str = r"(?i)\.jpg$";
pub const DEFAULT_PUBLIC_IP_RESOLVER: &str = "https://api.ipify.org";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(alias = "TELEGRAM_APITOKEN")]
    pub telegram_apitoken: String,

    /// Comma separated list of chat ids allowed to talk to the bot.
    #[serde(alias = "CHAT_ID")]
    pub chat_id: String,

    /// Semicolon separated list of directory trees to watch.
    #[serde(alias = "MONITORED_DIRECTORIES")]
    pub monitored_directories: Option<String>,

    #[serde(alias = "RATE_LIMIT")]
    pub rate_limit: Option<String>,

    #[serde(alias = "IMAGE_URL")]
    pub image_url: Option<String>,

    #[serde(alias = "SENSOR_DEVICE_PATH")]
    pub sensor_device_path: Option<String>,

    /// Semicolon separated filename patterns for the directory monitor.
    #[serde(alias = "FILE_PATTERNS")]
    pub file_patterns: Option<String>,

    #[serde(alias = "PUBLIC_IP_RESOLVER")]
    pub public_ip_resolver: Option<String>,

    #[serde(skip)]
    pub project_root: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // 1. Try standard dotenv discovery from current dir
        if dotenvy::dotenv().is_err() {
            // 2. Fallback: Try explicitly from resolved MEERKAT_ROOT
            let path = crate::path_utils::get_app_root().join(".env");
            if path.exists() {
                let _ = dotenvy::from_path(&path);
            }
        }

        let builder = Config::builder()
            .set_default("telegram_apitoken", "")?
            .set_default("chat_id", "")?
            .add_source(File::with_name("meerkat").required(false))
            .add_source(Environment::default());

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.project_root = crate::path_utils::get_app_root();

        Ok(config)
    }

    /// Authorized chat destinations, in configuration order, without duplicates.
    pub fn authorized_chats(&self) -> Result<Vec<i64>, SettingsError> {
        let mut chats = Vec::new();
        for raw in self.chat_id.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = raw
                .parse::<i64>()
                .map_err(|_| SettingsError::InvalidChatId(raw.to_string()))?;
            if !chats.contains(&id) {
                chats.push(id);
            }
        }

        if chats.is_empty() {
            return Err(SettingsError::NoChatIds);
        }
        Ok(chats)
    }

    pub fn monitored_directories(&self) -> Vec<PathBuf> {
        split_list(self.monitored_directories.as_deref(), ';')
            .map(crate::path_utils::get_path)
            .collect()
    }

    pub fn rate_limit(&self) -> Result<Option<Duration>, SettingsError> {
        match self.rate_limit.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_duration(raw).map(Some),
        }
    }

    pub fn file_patterns(&self) -> Vec<String> {
        let patterns: Vec<String> = split_list(self.file_patterns.as_deref(), ';')
            .map(str::to_string)
            .collect();
        if patterns.is_empty() {
            vec![DEFAULT_FILE_PATTERN.to_string()]
        } else {
            patterns
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn sensor_device_path(&self) -> PathBuf {
        self.sensor_device_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(crate::path_utils::get_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SENSOR_DEVICE_PATH))
    }

    pub fn public_ip_resolver(&self) -> &str {
        self.public_ip_resolver
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PUBLIC_IP_RESOLVER)
    }
}

fn split_list(raw: Option<&str>, separator: char) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parses humantime durations (`500ms`, `2s`, `5m`, `1h 30m`). A bare number
/// is taken as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, SettingsError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|_| SettingsError::InvalidDuration(raw.to_string()))
}
