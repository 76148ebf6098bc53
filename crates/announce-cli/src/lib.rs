//! Library half of the `piper-announce` binary: configuration and progress
//! rendering, kept separate so they can be tested without a process.

pub mod config;
pub mod progress;

pub use config::{apply_env_overrides, load_config, Config, ConfigError, RuntimeFlags};
pub use progress::{describe, spawn_renderer, ProgressMode};
