use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading a client configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level client configuration, handed explicitly to the clock and the
/// render core at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub clock: ClockConfig,
    pub render: RenderConfig,
}

impl ClientConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load a YAML configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

/// World clock tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// In-world seconds per wall-clock second.
    pub time_ratio: f64,
    /// Divergence (in-world seconds) between the reconciled and raw clock
    /// beyond which the reconciled clock is pulled toward the raw one.
    pub jump_threshold: f64,
    /// Base `b` of the correction factor `1 - b^-dt`.
    pub correction_base: f64,
    /// Length of the light cross-fade in wall-clock seconds.
    pub light_fade_secs: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_ratio: 3.29,
            jump_threshold: 1.0,
            correction_base: 10.0,
            light_fade_secs: 2.0,
        }
    }
}

/// Render core settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Dump generated shader source of every program that gets built.
    pub dump_shaders: bool,
    /// Initial capacity of newly created command buffers.
    pub command_buffer_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dump_shaders: false,
            command_buffer_capacity: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.clock.time_ratio, 3.29);
        assert_eq!(config.clock.light_fade_secs, 2.0);
        assert_eq!(config.render.command_buffer_capacity, 128);
        assert!(!config.render.dump_shaders);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = ClientConfig::from_yaml_str("clock:\n  time_ratio: 3.0\nrender:\n  dump_shaders: true\n").unwrap();
        assert_eq!(config.clock.time_ratio, 3.0);
        assert_eq!(config.clock.jump_threshold, 1.0);
        assert!(config.render.dump_shaders);
        assert_eq!(config.render.command_buffer_capacity, 128);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "render:\n  command_buffer_capacity: 16").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.render.command_buffer_capacity, 16);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ClientConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_yaml_is_yaml_error() {
        let err = ClientConfig::from_yaml_str("clock: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
