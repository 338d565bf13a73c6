//! Error types for hubstack.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors map to
//! semantic process exit codes so wrapper scripts can tell a bad parameter
//! apart from a failed lookup.

use std::io;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (invalid parameter, malformed instance type, bad file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Specified profile does not exist.
    #[error("Profile '{0}' not found. Check the profiles in your hubstack config file.")]
    ProfileNotFound(String),

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Action graph violation (duplicate or unknown action, dependency cycle).
    #[error("Dependency graph error: {0}")]
    Graph(String),

    /// The provisioning engine could not find a hosted zone for a domain.
    #[error("Hosted zone lookup failed for '{domain}': {reason}")]
    ZoneLookup {
        /// Domain that was looked up.
        domain: String,
        /// Reason reported by the engine.
        reason: String,
    },

    /// IO error (artifact files, object store mirror).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// General/unspecified error.
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the exit code for this error type.
    ///
    /// - 0: Success
    /// - 1: General error
    /// - 2: Invalid configuration or arguments
    /// - 5: Resource not found
    /// - 6: Conflicting action graph
    /// - 10: IO error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => 2,
            Error::ProfileNotFound(_) | Error::ZoneLookup { .. } => 5,
            Error::Graph(_) => 6,
            Error::Io(_) => 10,
            Error::Json(_) | Error::Yaml(_) | Error::Other(_) => 1,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a dependency graph error.
    pub fn graph(msg: impl Into<String>) -> Self {
        Error::Graph(msg.into())
    }

    /// Create a general error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::config("test").exit_code(), 2);
        assert_eq!(Error::invalid_arg("test").exit_code(), 2);
        assert_eq!(Error::ProfileNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::graph("cycle").exit_code(), 6);
        assert_eq!(Error::other("boom").exit_code(), 1);
    }

    #[test]
    fn test_zone_lookup_message() {
        let err = Error::ZoneLookup {
            domain: "example.com".into(),
            reason: "no such zone".into(),
        };
        assert!(err.to_string().contains("example.com"));
        assert_eq!(err.exit_code(), 5);
    }
}
