//! disclosure-guard error types

use thiserror::Error;

/// disclosure-guard error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid criterion or job configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A derived parameter or criterion was used before initialization
    #[error("Uninitialized use: {0}")]
    Uninitialized(String),

    /// Initialization was attempted a second time
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    /// A discipline-specific operation was invoked on a criterion of another discipline
    #[error("Criterion '{criterion}' does not support {operation}")]
    Discipline {
        /// Rendered criterion
        criterion: String,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The cooperative interrupt flag was raised during evaluation
    #[error("Computation interrupted")]
    Interrupted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for disclosure-guard operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Every variant maps to a distinct caller action; keep the match exhaustive.
    fn kind(err: &Error) -> &'static str {
        match err {
            Error::Config(_) => "config",
            Error::Uninitialized(_) | Error::AlreadyInitialized(_) => "lifecycle",
            Error::Discipline { .. } => "discipline",
            Error::Interrupted => "interrupted",
            Error::Io(_) | Error::Serialization(_) | Error::Toml(_) => "io",
        }
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Discipline {
            criterion: "5-anonymity".to_string(),
            operation: "enforce_matrix",
        };
        assert_eq!(kind(&err), "discipline");
        assert_eq!(
            err.to_string(),
            "Criterion '5-anonymity' does not support enforce_matrix"
        );
        assert_eq!(Error::Interrupted.to_string(), "Computation interrupted");
        assert_eq!(kind(&Error::Config("k = 0".to_string())), "config");

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(kind(&io), "io");
    }
}
