//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A tick was requested with a negative or non-finite delta.
    #[error("Invalid tick delta: {0}")]
    InvalidDelta(f32),

    /// `run_until` gave up before its predicate held.
    #[error("Condition not reached after {ticks} ticks")]
    TickLimit { ticks: u64 },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
