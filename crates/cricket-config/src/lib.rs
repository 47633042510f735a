//! Configuration for the cricket mixing engine.
//!
//! [`EngineConfig`] holds the tunables the engine reads at startup: graph
//! sample rate, render quantum, streaming buffer sizes, command queue
//! capacity, render budget, sample representation and ramp time. It is
//! stored as TOML, every field optional.
//!
//! Invalid values are never fatal. [`EngineConfig::validated`] replaces each
//! one with a safe value and logs a warning.
//!
//! # Example
//!
//! ```rust,no_run
//! use cricket_config::{EngineConfig, SampleTypeSetting, paths};
//!
//! let mut config = EngineConfig::default();
//! config.sample_type = SampleTypeSetting::Fixed;
//! config.save(paths::default_config_path()).unwrap();
//!
//! let loaded = paths::load_or_default(None).unwrap();
//! assert_eq!(loaded.sample_type, SampleTypeSetting::Fixed);
//! ```

mod engine_config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use engine_config::{
    EngineConfig, MAX_SAMPLE_RATE, MIN_AUDIO_TASKS, MIN_SAMPLE_RATE, SampleTypeSetting,
    load_config, save_config,
};
pub use error::{ConfigError, Result};
pub use paths::{default_config_path, ensure_user_config_dir, load_or_default, user_config_dir};
