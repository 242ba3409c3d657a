//! Error types for process spawning and lifecycle queries.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by [`spawn`](crate::spawn) and [`ProcessHandle`](crate::ProcessHandle).
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The command vector, environment or working directory was malformed.
    ///
    /// Always raised before any native call is made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The launcher binary or the native process layer is unavailable.
    ///
    /// Determined once at initialization and returned by every later spawn.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The native spawn call failed; no handle was produced.
    #[error("Failed to spawn process `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The exit status was queried before the process exited.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A blocking wait was interrupted by the caller's [`Interrupt`](crate::Interrupt).
    #[error("Wait for process {pid} was interrupted")]
    Interrupted { pid: u32 },
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn spawn(program: impl Into<String>, source: Arc<io::Error>) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Whether this error came from argument validation.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_spawn_error_keeps_source() {
        let err = Error::spawn(
            "missing",
            Arc::new(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        );
        assert_eq!(
            err.to_string(),
            "Failed to spawn process `missing`: no such file"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_argument_predicate() {
        assert!(Error::invalid_argument("empty").is_invalid_argument());
        assert!(!Error::IllegalState("x".into()).is_invalid_argument());
    }
}
