//! Error types for the TraceNet engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring a simulation or persisting its results.
///
/// The step loop itself never fails: once a configuration validates, every
/// episode runs to completion.
#[derive(Debug, Error)]
pub enum SimError {
    /// A parameter is outside its valid domain (probability not in `[0, 1]`,
    /// empty population, unknown strategy identifier, ...).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The output location could not be created or written.
    #[error("Output error at {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Result encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Creates an invalid-parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates an output error for the given path.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }

    /// Creates a serialization error.
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let err = SimError::invalid("population must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: population must be positive"
        );
    }

    #[test]
    fn test_output_error_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SimError::output("/tmp/results", io);
        match err {
            SimError::Output { path, .. } => assert_eq!(path, PathBuf::from("/tmp/results")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
