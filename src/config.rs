//! Application-level configuration loading for session tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STAGELINK_BACK_CONFIG_PATH";

/// Countdown used when a question or quiz carries no duration of its own.
const DEFAULT_TIMER_SECONDS: u32 = 60;
/// Number of entries the quiz leaderboard is truncated to.
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
/// Capacity of the broadcast channel feeding SSE and WebSocket clients.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    fallback_timer_seconds: u32,
    leaderboard_limit: usize,
    event_channel_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded session configuration");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Countdown used when the live subject carries no duration.
    pub fn fallback_timer_seconds(&self) -> u32 {
        self.fallback_timer_seconds
    }

    /// Maximum number of leaderboard entries returned for a quiz.
    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit
    }

    /// Capacity of the realtime broadcast channel.
    pub fn event_channel_capacity(&self) -> usize {
        self.event_channel_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fallback_timer_seconds: DEFAULT_TIMER_SECONDS,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    fallback_timer_seconds: Option<u32>,
    leaderboard_limit: Option<usize>,
    event_channel_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            fallback_timer_seconds: value
                .fallback_timer_seconds
                .unwrap_or(DEFAULT_TIMER_SECONDS),
            leaderboard_limit: value.leaderboard_limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT),
            event_channel_capacity: value
                .event_channel_capacity
                .unwrap_or(DEFAULT_EVENT_CHANNEL_CAPACITY),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
