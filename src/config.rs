//! Configuration and settings management
//!
//! Loads settings from environment variables and defines pipeline tuning constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Public bot username, shown in delivery captions
    #[serde(default = "default_bot_username")]
    pub bot_username: String,

    /// Directory holding staging files for in-flight requests
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

fn default_bot_username() -> String {
    "@UniGifConverterBot".to_string()
}

fn default_temp_dir() -> String {
    "./temp".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or `telegram_token` is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Settings from environment variables directly.
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

// Pipeline tuning

/// Output clip length for static image inputs, seconds
pub const STATIC_CLIP_SECS: u32 = 3;
/// Output clip length for video inputs, seconds
pub const VIDEO_CLIP_SECS: u32 = 12;
/// Downloads smaller than this are error pages, not media
pub const MIN_MEDIA_BYTES: u64 = 100;
/// Inputs narrower than this are upsampled to exactly this width
pub const UPSCALE_MIN_WIDTH: u32 = 640;
/// Constant-rate-factor quality for the output encode
pub const OUTPUT_CRF: u32 = 20;
/// Wall-clock limit for a single ffmpeg invocation
pub const TRANSCODE_TIMEOUT_SECS: u64 = 180;

// Storage janitor

/// Sweep interval for the temp directory
pub const JANITOR_INTERVAL_SECS: u64 = 600;
/// Staging files older than this are collected regardless of request state
pub const STALE_AFTER_SECS: u64 = 900;
