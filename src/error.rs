//! Top-level error type for the watermon binaries

use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the publish and watch commands
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for watermon operations
pub type MonitorResult<T> = Result<T, MonitorError>;
