//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every key is optional:
//!
//! ```toml
//! target_fps = 60
//! max_delta_seconds = 0.1
//! log_slow_frames = true
//!
//! [render]
//! sort_epsilon = 0.0001
//! initial_queue_capacity = 1024
//! start_writable = true
//!
//! [network]
//! enabled = false
//! default_update_period = 0.1
//! ```

use std::path::Path;
use std::time::Duration;

use sable_rendering::{RenderSettings, DEFAULT_SORT_EPSILON};
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Simulation rate used for the frame budget and fixed steps.
    pub target_fps: u32,
    /// Upper bound of the delta handed to a tick.
    pub max_delta_seconds: f32,
    /// Warn about ticks that exceed the frame budget.
    pub log_slow_frames: bool,
    /// Rendering pass settings.
    pub render: RenderConfig,
    /// Replication settings.
    pub network: NetworkConfig,
}

/// `[render]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Depth distance under which translucent draws share a layer.
    pub sort_epsilon: f32,
    /// Initial entry capacity of each queue buffer.
    pub initial_queue_capacity: usize,
    /// Whether frames are produced before the surface becomes visible.
    pub start_writable: bool,
}

/// `[network]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Registers the network pass.
    pub enabled: bool,
    /// Seconds between updates of a replicated component. Zero or less
    /// sends once.
    pub default_update_period: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_delta_seconds: 0.1,
            log_slow_frames: true,
            render: RenderConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            sort_epsilon: DEFAULT_SORT_EPSILON,
            initial_queue_capacity: settings.initial_queue_capacity,
            start_writable: settings.start_writable,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_update_period: 0.1,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigParse`] for malformed TOML or unknown
    /// keys, and [`EngineError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::from_toml_str`], plus
    /// [`EngineError::ConfigRead`] when the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first bad key.
    pub fn validate(&self) -> EngineResult<()> {
        if self.target_fps == 0 {
            return Err(EngineError::InvalidConfig {
                key: "target_fps",
                reason: "must be at least 1",
            });
        }
        if self.max_delta_seconds.is_nan() || self.max_delta_seconds <= 0.0 {
            return Err(EngineError::InvalidConfig {
                key: "max_delta_seconds",
                reason: "must be positive",
            });
        }
        if self.render.sort_epsilon.is_nan() || self.render.sort_epsilon < 0.0 {
            return Err(EngineError::InvalidConfig {
                key: "render.sort_epsilon",
                reason: "must not be negative",
            });
        }
        Ok(())
    }

    /// Wall time one tick may take at the target rate.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }

    /// Delta of one fixed step at the target rate.
    #[must_use]
    pub fn fixed_delta(&self) -> f32 {
        1.0 / self.target_fps.max(1) as f32
    }

    /// Settings handed to the rendering pass.
    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            sort_epsilon: self.render.sort_epsilon,
            initial_queue_capacity: self.render.initial_queue_capacity,
            start_writable: self.render.start_writable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.render_settings(), RenderSettings::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            target_fps = 30

            [network]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.target_fps, 30);
        assert!(config.network.enabled);
        assert!((config.network.default_update_period - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.frame_budget(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = EngineConfig::from_toml_str("[render]\nvsync = true").unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        let err = EngineConfig::from_toml_str("target_fps = 0").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidConfig {
                key: "target_fps",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/sable.toml").unwrap_err();
        assert!(matches!(err, EngineError::ConfigRead { .. }));
    }
}
