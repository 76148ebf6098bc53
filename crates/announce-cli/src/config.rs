//! Configuration loading from file and environment variables.

use announce_assets::{RetryPolicy, DEFAULT_PROGRESS_INTERVAL};
use announce_voice::rewrite::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub voices: VoicesConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoicesConfig {
    /// Explicit voice directory. When unset the conventional locations are
    /// searched.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// External executables and how long they may run.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Piper executable. When unset it is located automatically.
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Where engine releases are installed, one subdirectory per platform.
    #[serde(default = "default_binaries_dir")]
    pub binaries_dir: PathBuf,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Upper bound on each engine or ffmpeg call.
    #[serde(default = "default_process_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Attempts per file; 1 disables retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for each further one.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Minimum spacing between progress updates.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Connection timeout for asset downloads.
    #[serde(default = "default_connect_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest silence tolerated while a body streams.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory announcements are written to.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

/// Announcement rewriting through an OpenAI-compatible API.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_writer_base_url")]
    pub base_url: String,

    #[serde(default = "default_writer_model")]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "announce_assets=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_binaries_dir() -> PathBuf {
    PathBuf::from("binaries")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_process_timeout_secs() -> u64 {
    announce_exec::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL.as_millis() as u64
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_writer_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_writer_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            binaries_dir: default_binaries_dir(),
            ffmpeg: default_ffmpeg(),
            timeout_secs: default_process_timeout_secs(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_writer_base_url(),
            model: default_writer_model(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DownloadConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VOICES_DIR` overrides `voices.dir`
/// - `PIPER_BIN` overrides `engine.binary`
/// - `FFMPEG_BIN` overrides `engine.ffmpeg`
/// - `OPENAI_API_KEY` overrides `writer.api_key`
/// - `ANNOUNCE_LOG_LEVEL` overrides `logging.level`
/// - `ANNOUNCE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies the overrides listed on [`load_config`], reading variables
/// through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = var("VOICES_DIR").and_then(non_empty) {
        config.voices.dir = Some(PathBuf::from(dir));
    }
    if let Some(bin) = var("PIPER_BIN").and_then(non_empty) {
        config.engine.binary = Some(PathBuf::from(bin));
    }
    if let Some(ffmpeg) = var("FFMPEG_BIN").and_then(non_empty) {
        config.engine.ffmpeg = PathBuf::from(ffmpeg);
    }
    if let Some(key) = var("OPENAI_API_KEY").and_then(non_empty) {
        config.writer.api_key = Some(key);
    }
    if let Some(level) = var("ANNOUNCE_LOG_LEVEL").and_then(non_empty) {
        config.logging.level = level;
    }
    if let Some(json) = var("ANNOUNCE_LOG_JSON") {
        config.logging.json = is_truthy(&json);
    }
}

/// Install-time switches read straight from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeFlags {
    /// `SKIP_VOICE_DOWNLOAD`: the install hook does nothing.
    pub skip_voice_download: bool,
    /// `SKIP_BINARY_DOWNLOAD`: engine binaries are not fetched.
    pub skip_binary_download: bool,
    /// Any of `CI`, `CONTINUOUS_INTEGRATION` or `BUILD_NUMBER` is set.
    pub ci: bool,
}

impl RuntimeFlags {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| var(key).is_some_and(|v| is_truthy(&v));
        Self {
            skip_voice_download: flag("SKIP_VOICE_DOWNLOAD"),
            skip_binary_download: flag("SKIP_BINARY_DOWNLOAD"),
            ci: ["CI", "CONTINUOUS_INTEGRATION", "BUILD_NUMBER"]
                .iter()
                .any(|key| var(key).is_some_and(|v| !v.is_empty() && v != "false")),
        }
    }
}
