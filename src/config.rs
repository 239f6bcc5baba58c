//! Application-level configuration loading, including the drawing catalog and timing constants.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::info;

use crate::{
    error::ConfigError,
    state::{catalog::DrawingCatalog, rotation::RotationPolicy},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARTLOOP_BACK_CONFIG_PATH";

/// Seconds between two reveals.
pub const DEFAULT_TIMER_DURATION_SECS: u32 = 60;
/// Number of retired drawings kept in the gallery.
pub const DEFAULT_GALLERY_MAX: usize = 20;
/// Number of chat messages retained and replayed to new viewers.
pub const DEFAULT_CHAT_MAX: usize = 50;
/// Lower bound of the simulated drawing time.
pub const DEFAULT_REVEAL_DELAY_MIN: Duration = Duration::from_millis(3_000);
/// Upper bound of the simulated drawing time.
pub const DEFAULT_REVEAL_DELAY_MAX: Duration = Duration::from_millis(5_000);
/// Pause between showing the new drawing and restarting the countdown.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(2_000);
/// Consecutive failed connection attempts before a client goes offline.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
/// Overall time a client waits for a first handshake before going offline.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(15);
/// Pause between two client connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);
/// Capacity of the broadcast channel feeding viewers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
/// Prefix of gallery titles (`Art #3`).
pub const DEFAULT_GALLERY_TITLE_PREFIX: &str = "Art";

/// Settings consumed by a drawing engine (the server's or a client's offline fallback).
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Drawings to rotate through.
    pub catalog: DrawingCatalog,
    /// How the next drawing is chosen.
    pub rotation: RotationPolicy,
    /// Countdown length in seconds.
    pub timer_duration: u32,
    /// Retired drawings kept in the gallery.
    pub gallery_max: usize,
    /// Chat messages kept and replayed.
    pub chat_max: usize,
    /// Shortest simulated drawing time.
    pub reveal_delay_min: Duration,
    /// Longest simulated drawing time.
    pub reveal_delay_max: Duration,
    /// Pause after a reveal before the countdown restarts.
    pub grace_delay: Duration,
    /// Prefix of gallery titles.
    pub gallery_title_prefix: String,
    /// Broadcast buffer size per subscriber.
    pub channel_capacity: usize,
}

impl EngineSettings {
    /// Settings with the documented defaults around `catalog`.
    pub fn new(catalog: DrawingCatalog) -> Self {
        Self {
            catalog,
            rotation: RotationPolicy::default(),
            timer_duration: DEFAULT_TIMER_DURATION_SECS,
            gallery_max: DEFAULT_GALLERY_MAX,
            chat_max: DEFAULT_CHAT_MAX,
            reveal_delay_min: DEFAULT_REVEAL_DELAY_MIN,
            reveal_delay_max: DEFAULT_REVEAL_DELAY_MAX,
            grace_delay: DEFAULT_GRACE_DELAY,
            gallery_title_prefix: DEFAULT_GALLERY_TITLE_PREFIX.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer_duration == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.gallery_max == 0 {
            return Err(ConfigError::ZeroCapacity("gallery_max"));
        }
        if self.chat_max == 0 {
            return Err(ConfigError::ZeroCapacity("chat_max"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("channel_capacity"));
        }
        if self.reveal_delay_min > self.reveal_delay_max {
            return Err(ConfigError::InvalidRevealDelay {
                min: self.reveal_delay_min,
                max: self.reveal_delay_max,
            });
        }
        Ok(())
    }
}

/// Settings consumed by a client sync agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    /// Consecutive failures before going offline.
    pub max_retry_attempts: u32,
    /// Time without a handshake before going offline.
    pub connection_timeout: Duration,
    /// Pause between two attempts.
    pub retry_delay: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    engine: EngineSettings,
    agent: AgentSettings,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in defaults when no file exists.
    ///
    /// A file that exists but cannot be read, parsed, or validated is an error: the server
    /// must not start with a configuration it did not ask for.
    pub fn load() -> Result<Self, ConfigError> {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let app_config = Self::from_json_str(&contents)
                    .map_err(|err| err.at_path(&path))?;
                info!(
                    path = %path.display(),
                    drawings = app_config.engine.catalog.len(),
                    "loaded configuration"
                );
                Ok(app_config)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default().try_into()
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents).map_err(ConfigError::Parse)?;
        raw.try_into()
    }

    /// Settings of the drawing engine.
    pub fn engine(&self) -> &EngineSettings {
        &self.engine
    }

    /// Settings of client sync agents.
    pub fn agent(&self) -> AgentSettings {
        self.agent
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    catalog: Vec<String>,
    rotation: RotationPolicy,
    timer_duration_secs: u32,
    gallery_max: usize,
    chat_max: usize,
    #[serde(rename = "reveal_delay_min_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    reveal_delay_min: Duration,
    #[serde(rename = "reveal_delay_max_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    reveal_delay_max: Duration,
    #[serde(rename = "grace_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    grace_delay: Duration,
    max_retry_attempts: u32,
    #[serde(rename = "connection_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    connection_timeout: Duration,
    #[serde(rename = "retry_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    retry_delay: Duration,
    gallery_title_prefix: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        let agent = AgentSettings::default();
        Self {
            catalog: default_catalog(),
            rotation: RotationPolicy::default(),
            timer_duration_secs: DEFAULT_TIMER_DURATION_SECS,
            gallery_max: DEFAULT_GALLERY_MAX,
            chat_max: DEFAULT_CHAT_MAX,
            reveal_delay_min: DEFAULT_REVEAL_DELAY_MIN,
            reveal_delay_max: DEFAULT_REVEAL_DELAY_MAX,
            grace_delay: DEFAULT_GRACE_DELAY,
            max_retry_attempts: agent.max_retry_attempts,
            connection_timeout: agent.connection_timeout,
            retry_delay: agent.retry_delay,
            gallery_title_prefix: DEFAULT_GALLERY_TITLE_PREFIX.to_string(),
        }
    }
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let engine = EngineSettings {
            catalog: DrawingCatalog::from_paths(value.catalog)?,
            rotation: value.rotation,
            timer_duration: value.timer_duration_secs,
            gallery_max: value.gallery_max,
            chat_max: value.chat_max,
            reveal_delay_min: value.reveal_delay_min,
            reveal_delay_max: value.reveal_delay_max,
            grace_delay: value.grace_delay,
            gallery_title_prefix: value.gallery_title_prefix,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        };
        engine.validate()?;

        if value.max_retry_attempts == 0 {
            return Err(ConfigError::ZeroCapacity("max_retry_attempts"));
        }
        let agent = AgentSettings {
            max_retry_attempts: value.max_retry_attempts,
            connection_timeout: value.connection_timeout,
            retry_delay: value.retry_delay,
        };

        Ok(Self { engine, agent })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in catalog shipped with the binary.
fn default_catalog() -> Vec<String> {
    (1..=24)
        .map(|n| format!("/drawings/drawing-{n:02}.png"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_documented_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        let engine = config.engine();
        assert_eq!(engine.catalog.len(), 24);
        assert_eq!(engine.rotation, RotationPolicy::Sequential);
        assert_eq!(engine.timer_duration, 60);
        assert_eq!(engine.gallery_max, 20);
        assert_eq!(engine.chat_max, 50);
        assert_eq!(engine.reveal_delay_min, Duration::from_secs(3));
        assert_eq!(engine.reveal_delay_max, Duration::from_secs(5));
        assert_eq!(engine.grace_delay, Duration::from_secs(2));
        assert_eq!(config.agent(), AgentSettings::default());
        assert_eq!(config.agent().max_retry_attempts, 5);
        assert_eq!(config.agent().connection_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_json_str(
            r#"{
                "catalog": ["/a.png", "/b.png"],
                "rotation": "shuffle",
                "timer_duration_secs": 30,
                "reveal_delay_min_ms": 100,
                "reveal_delay_max_ms": 200,
                "connection_timeout_ms": 500
            }"#,
        )
        .unwrap();
        assert_eq!(config.engine().catalog.len(), 2);
        assert_eq!(config.engine().rotation, RotationPolicy::Shuffle);
        assert_eq!(config.engine().timer_duration, 30);
        assert_eq!(config.engine().reveal_delay_max, Duration::from_millis(200));
        assert_eq!(config.agent().connection_timeout, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values_are_fatal() {
        assert!(matches!(
            AppConfig::from_json_str(r#"{"catalog": []}"#),
            Err(ConfigError::EmptyCatalog)
        ));
        assert!(matches!(
            AppConfig::from_json_str(r#"{"timer_duration_secs": 0}"#),
            Err(ConfigError::ZeroDuration)
        ));
        assert!(matches!(
            AppConfig::from_json_str(r#"{"reveal_delay_min_ms": 6000}"#),
            Err(ConfigError::InvalidRevealDelay { .. })
        ));
        assert!(matches!(
            AppConfig::from_json_str(r#"{"gallery_max": 0}"#),
            Err(ConfigError::ZeroCapacity("gallery_max"))
        ));
        assert!(matches!(
            AppConfig::from_json_str(r#"{"unknown": 1}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
