//! Error types for registration and dispatch.

use thiserror::Error;

use crate::key::RegistrationKey;
use crate::outcome::BoxError;

/// Errors raised when modifying a processor's tables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The key is already present in the table.
    #[error("key {key} is already registered for `{payload}`")]
    DuplicateKey {
        /// The table's payload type.
        payload: &'static str,
        /// The conflicting key.
        key: RegistrationKey,
    },

    /// The tables are borrowed by a dispatch that is still running.
    #[error("cannot modify `{payload}` registrations while a dispatch is in progress")]
    DispatchInProgress {
        /// The payload type being modified.
        payload: &'static str,
    },
}

impl RegisterError {
    /// Creates a duplicate key error.
    pub fn duplicate_key(payload: &'static str, key: RegistrationKey) -> Self {
        Self::DuplicateKey { payload, key }
    }

    /// Creates a dispatch-in-progress error.
    pub fn dispatch_in_progress(payload: &'static str) -> Self {
        Self::DispatchInProgress { payload }
    }
}

/// Errors raised by validators and handlers during dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A validator returned an error.
    #[error("validator for `{payload}` failed: {source}")]
    Validator {
        /// The table's payload type.
        payload: &'static str,
        /// The validator's error.
        #[source]
        source: BoxError,
    },

    /// A handler returned an error.
    #[error("handler for `{payload}` failed: {source}")]
    Handler {
        /// The table's payload type.
        payload: &'static str,
        /// The handler's error.
        #[source]
        source: BoxError,
    },

    /// Several callbacks of one table failed; every callback still ran.
    #[error("{count} callback(s) for `{payload}` failed", count = .errors.len())]
    Aggregate {
        /// The table's payload type.
        payload: &'static str,
        /// The collected errors, in callback order.
        errors: Vec<DispatchError>,
    },
}

impl DispatchError {
    /// Wraps a validator error.
    pub fn validator(payload: &'static str, source: BoxError) -> Self {
        Self::Validator { payload, source }
    }

    /// Wraps a handler error.
    pub fn handler(payload: &'static str, source: BoxError) -> Self {
        Self::Handler { payload, source }
    }

    /// Returns the errors this error stands for.
    ///
    /// A single error for `Validator` and `Handler`; the collected errors for
    /// `Aggregate`.
    pub fn errors(&self) -> &[DispatchError] {
        match self {
            Self::Aggregate { errors, .. } => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for registration operations.
pub type RegisterResult<T> = Result<T, RegisterError>;
