//! Engine configuration file format and validation.

use cricket_core::SampleType;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Lowest graph sample rate accepted by [`EngineConfig::validated`].
pub const MIN_SAMPLE_RATE: u32 = 8000;
/// Highest graph sample rate accepted by [`EngineConfig::validated`].
pub const MAX_SAMPLE_RATE: u32 = 48000;
/// Smallest command queue capacity accepted by [`EngineConfig::validated`].
pub const MIN_AUDIO_TASKS: usize = 10;

/// Requested sample representation for the mixing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleTypeSetting {
    /// Pick the faster representation for the target.
    #[default]
    Auto,
    /// 8.24 fixed point.
    Fixed,
    /// 32-bit float.
    Float,
}

impl SampleTypeSetting {
    /// Resolves `Auto` for the compilation target: fixed point on 32-bit
    /// ARM, float everywhere else.
    pub fn resolve(self) -> SampleType {
        match self {
            SampleTypeSetting::Fixed => SampleType::Fixed,
            SampleTypeSetting::Float => SampleType::Float,
            SampleTypeSetting::Auto => {
                if cfg!(target_arch = "arm") {
                    SampleType::Fixed
                } else {
                    SampleType::Float
                }
            }
        }
    }
}

/// Engine configuration.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 44100
/// audio_update_ms = 5.0
/// stream_buffer_ms = 500.0
/// stream_file_update_ms = 100.0
/// max_audio_tasks = 500
/// max_render_load = 0.8
/// sample_type = "auto"
/// volume_ramp_ms = 40.0
/// ```
///
/// Every field is optional; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Graph output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Render quantum length in milliseconds. Sizes the scratch buffers.
    #[serde(default = "default_audio_update_ms")]
    pub audio_update_ms: f32,

    /// Amount of audio each streaming sound buffers ahead, in milliseconds.
    #[serde(default = "default_stream_buffer_ms")]
    pub stream_buffer_ms: f32,

    /// Interval between stream refills on the file thread, in milliseconds.
    #[serde(default = "default_stream_file_update_ms")]
    pub stream_file_update_ms: f32,

    /// Initial command queue capacity.
    #[serde(default = "default_max_audio_tasks")]
    pub max_audio_tasks: usize,

    /// Fraction of the render quantum a mix node may spend before it stops
    /// summing further inputs.
    #[serde(default = "default_max_render_load")]
    pub max_render_load: f32,

    /// Sample representation of the mixing pipeline.
    #[serde(default)]
    pub sample_type: SampleTypeSetting,

    /// Volume and pan ramp time in milliseconds.
    #[serde(default = "default_volume_ramp_ms")]
    pub volume_ramp_ms: f32,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_audio_update_ms() -> f32 {
    5.0
}

fn default_stream_buffer_ms() -> f32 {
    500.0
}

fn default_stream_file_update_ms() -> f32 {
    100.0
}

fn default_max_audio_tasks() -> usize {
    500
}

fn default_max_render_load() -> f32 {
    0.8
}

fn default_volume_ramp_ms() -> f32 {
    40.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            audio_update_ms: default_audio_update_ms(),
            stream_buffer_ms: default_stream_buffer_ms(),
            stream_file_update_ms: default_stream_file_update_ms(),
            max_audio_tasks: default_max_audio_tasks(),
            max_render_load: default_max_render_load(),
            sample_type: SampleTypeSetting::default(),
            volume_ramp_ms: default_volume_ramp_ms(),
        }
    }
}

/// Replaces a non-positive or non-finite duration with its default.
fn check_ms(name: &str, value: &mut f32, default: f32) {
    if !(value.is_finite() && *value > 0.0) {
        tracing::warn!(field = name, value = *value, default, "invalid config value; using default");
        *value = default;
    }
}

impl EngineConfig {
    /// Returns a copy with every invalid field corrected.
    ///
    /// Non-positive durations and out-of-range loads fall back to their
    /// defaults, a queue smaller than [`MIN_AUDIO_TASKS`] takes the default
    /// capacity, and the sample rate is clamped into
    /// [`MIN_SAMPLE_RATE`]..=[`MAX_SAMPLE_RATE`]. Each correction logs one
    /// warning.
    #[must_use]
    pub fn validated(&self) -> Self {
        let mut cfg = self.clone();

        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&cfg.sample_rate) {
            let clamped = cfg.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
            tracing::warn!(value = cfg.sample_rate, clamped, "sample_rate out of range; clamping");
            cfg.sample_rate = clamped;
        }

        check_ms("audio_update_ms", &mut cfg.audio_update_ms, default_audio_update_ms());
        check_ms("stream_buffer_ms", &mut cfg.stream_buffer_ms, default_stream_buffer_ms());
        check_ms(
            "stream_file_update_ms",
            &mut cfg.stream_file_update_ms,
            default_stream_file_update_ms(),
        );

        if cfg.max_audio_tasks < MIN_AUDIO_TASKS {
            tracing::warn!(
                value = cfg.max_audio_tasks,
                default = default_max_audio_tasks(),
                "max_audio_tasks too small; using default"
            );
            cfg.max_audio_tasks = default_max_audio_tasks();
        }

        if !(cfg.max_render_load > 0.0 && cfg.max_render_load <= 1.0) {
            tracing::warn!(
                value = cfg.max_render_load,
                default = default_max_render_load(),
                "max_render_load outside (0, 1]; using default"
            );
            cfg.max_render_load = default_max_render_load();
        }

        if !(cfg.volume_ramp_ms.is_finite() && cfg.volume_ramp_ms >= 0.0) {
            tracing::warn!(
                value = cfg.volume_ramp_ms,
                default = default_volume_ramp_ms(),
                "volume_ramp_ms negative; using default"
            );
            cfg.volume_ramp_ms = default_volume_ramp_ms();
        }

        cfg
    }

    /// Resolved sample representation.
    pub fn resolved_sample_type(&self) -> SampleType {
        self.sample_type.resolve()
    }

    /// Frames in one render quantum at the graph rate.
    pub fn frames_per_update(&self) -> usize {
        (self.sample_rate as f32 * self.audio_update_ms * 0.001) as usize
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the configuration as TOML text.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }
}

/// Load a configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    EngineConfig::load(path)
}

/// Save a configuration to a TOML file.
pub fn save_config(path: impl AsRef<Path>, config: &EngineConfig) -> Result<()> {
    config.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sample_rate, 44100);
        assert_eq!(cfg.audio_update_ms, 5.0);
        assert_eq!(cfg.stream_buffer_ms, 500.0);
        assert_eq!(cfg.stream_file_update_ms, 100.0);
        assert_eq!(cfg.max_audio_tasks, 500);
        assert_eq!(cfg.max_render_load, 0.8);
        assert_eq!(cfg.sample_type, SampleTypeSetting::Auto);
        assert_eq!(cfg.volume_ramp_ms, 40.0);
        assert_eq!(cfg.frames_per_update(), 220);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = EngineConfig::from_toml("sample_rate = 22050\nsample_type = \"fixed\"\n").unwrap();
        assert_eq!(cfg.sample_rate, 22050);
        assert_eq!(cfg.sample_type, SampleTypeSetting::Fixed);
        assert_eq!(cfg.audio_update_ms, 5.0);
        assert_eq!(cfg.max_audio_tasks, 500);
    }

    #[test]
    fn validated_leaves_good_config_alone() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.validated(), cfg);
    }

    #[test]
    fn validated_fixes_bad_values() {
        let cfg = EngineConfig {
            sample_rate: 96000,
            audio_update_ms: 0.0,
            stream_buffer_ms: -1.0,
            stream_file_update_ms: f32::NAN,
            max_audio_tasks: 3,
            max_render_load: 1.5,
            sample_type: SampleTypeSetting::Float,
            volume_ramp_ms: -5.0,
        }
        .validated();

        assert_eq!(cfg.sample_rate, MAX_SAMPLE_RATE);
        assert_eq!(cfg.audio_update_ms, 5.0);
        assert_eq!(cfg.stream_buffer_ms, 500.0);
        assert_eq!(cfg.stream_file_update_ms, 100.0);
        assert_eq!(cfg.max_audio_tasks, 500);
        assert_eq!(cfg.max_render_load, 0.8);
        assert_eq!(cfg.sample_type, SampleTypeSetting::Float);
        assert_eq!(cfg.volume_ramp_ms, 40.0);
    }

    #[test]
    fn zero_ramp_is_valid() {
        let cfg = EngineConfig {
            volume_ramp_ms: 0.0,
            sample_rate: 4000,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(cfg.volume_ramp_ms, 0.0);
        assert_eq!(cfg.sample_rate, MIN_SAMPLE_RATE);
    }

    #[test]
    fn explicit_sample_types_resolve() {
        assert_eq!(SampleTypeSetting::Fixed.resolve(), SampleType::Fixed);
        assert_eq!(SampleTypeSetting::Float.resolve(), SampleType::Float);
    }

    #[test]
    fn unknown_sample_type_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml("sample_type = \"double\""),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
