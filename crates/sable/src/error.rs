//! # Engine Error Types

use std::path::PathBuf;

use sable_core::EcsError;
use thiserror::Error;

/// Errors raised while building or running the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        /// File that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has wrongly typed keys.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid config value '{key}': {reason}")]
    InvalidConfig {
        /// Dotted key path.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An entity/component operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The render thread could not be started.
    #[error("failed to spawn render thread: {0}")]
    RenderThreadSpawn(#[source] std::io::Error),

    /// The render thread panicked before shutdown.
    #[error("render thread panicked")]
    RenderThreadPanicked,

    /// Networking was disabled in the configuration.
    #[error("networking is disabled")]
    NetworkDisabled,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
