//! Error types for Switchboard.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the exact failure. Construction problems surface as [`ValidationError`]
//! and never occur later; runtime misuse and unmatched subjects surface as
//! [`ExecutionError`].

use thiserror::Error;

use crate::cell::ChangePhase;
use crate::predicate::PredicateKind;

/// Validation errors raised while constructing predicates or loading config.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload {
        kind: PredicateKind,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl ValidationError {
    /// Creates an invalid payload error for the given predicate kind.
    #[must_use]
    pub fn invalid_payload(kind: PredicateKind, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }
}

/// Execution errors raised by engines, cells and accessors at run time.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Engine '{engine}' is sealed; cases and defaults can no longer be added")]
    EngineSealed {
        engine: String,
    },

    #[error("Engine '{engine}' must be sealed before evaluation")]
    EngineNotSealed {
        engine: String,
    },

    #[error("No case of engine '{engine}' matched the subject and no default is set")]
    NoMatchingCase {
        engine: String,
    },

    #[error("{phase}-change callback failed: {message}")]
    Callback {
        phase: ChangePhase,
        message: String,
    },

    #[error("Cell '{cell}' was assigned from one of its own callbacks")]
    ReentrantAssignment {
        cell: String,
    },

    #[error("Timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Poisoned lock: {context}")]
    PoisonedLock {
        context: &'static str,
    },
}

/// Error returned by fallible change callbacks.
///
/// The message is carried into [`ExecutionError::Callback`] when the
/// failure propagates out of [`ObservableCell::set`](crate::ObservableCell::set).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    /// Creates a callback error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Top-level error type for Switchboard.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl SwitchError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if evaluation found neither a matching case nor a default.
    #[must_use]
    pub const fn is_no_match(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::NoMatchingCase { .. }))
    }

    /// Returns true if a build-phase call hit a sealed engine.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::EngineSealed { .. }))
    }
}

/// Result type alias for Switchboard operations.
pub type SwitchResult<T> = Result<T, SwitchError>;
