//! Error types for the relay engine.

use thiserror::Error;

/// Errors that can occur while loading, transforming, or persisting calendars.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Module '{module}': missing mandatory parameter '{parameter}'")]
    MissingParameter {
        module: String,
        parameter: String,
    },

    #[error("Module '{module}': invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        module: String,
        parameter: String,
        reason: String,
    },

    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Request to '{url}' timed out after {timeout}")]
    FetchTimeout { url: String, timeout: String },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Module '{module}' returned an impossible event delta of {delta}")]
    InvariantViolation { module: String, delta: i64 },

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub(crate) fn missing(module: &str, parameter: &str) -> Self {
        RelayError::MissingParameter {
            module: module.to_string(),
            parameter: parameter.to_string(),
        }
    }

    pub(crate) fn invalid(module: &str, parameter: &str, reason: impl ToString) -> Self {
        RelayError::InvalidParameter {
            module: module.to_string(),
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors caused by what a profile asked for rather than by the
    /// environment the relay runs in.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingParameter { .. }
                | RelayError::InvalidParameter { .. }
                | RelayError::UnknownModule(_)
                | RelayError::NotFound(_)
        )
    }
}

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
