//! Error types for the lifecycle controller.

use thiserror::Error;

use crate::phase::Phase;

/// Errors returned by controller operations called in the wrong phase.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The operation is not allowed in the current phase.
    #[error("cannot {operation} while in the {phase} phase (expected {expected})")]
    InvalidPhase {
        /// The rejected operation.
        operation: &'static str,
        /// The phase the controller was in.
        phase: Phase,
        /// The phase the operation requires.
        expected: Phase,
    },
}

impl LifecycleError {
    /// Creates an invalid phase error.
    pub fn invalid_phase(operation: &'static str, phase: Phase, expected: Phase) -> Self {
        Self::InvalidPhase {
            operation,
            phase,
            expected,
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// An error reported by a component through its error handler.
///
/// Reporting an error to the controller is terminal: the controller notifies
/// its error handlers and disposes itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ComponentError {
    code: Option<i32>,
    message: String,
}

impl ComponentError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error with a numeric code and a message.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Returns the error code, if any.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_phase_message() {
        let err = LifecycleError::invalid_phase("cancel", Phase::Update, Phase::Setup);
        assert_eq!(err.to_string(), "cannot cancel while in the update phase (expected setup)");
    }

    #[test]
    fn test_component_error_accessors() {
        let err = ComponentError::with_code(404, "asset missing");
        assert_eq!(err.code(), Some(404));
        assert_eq!(err.message(), "asset missing");
        assert_eq!(err.to_string(), "asset missing");
        assert_eq!(ComponentError::from("x").code(), None);
    }
}
