//! Error types for the scmlink core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

/// Boxed error returned by external collaborators such as a
/// [`VersionSource`](crate::capability::VersionSource).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Capability resolution errors
// ---------------------------------------------------------------------------

/// Errors from resolving the capability variant of a server connection.
///
/// An unparseable version string is *not* an error; it falls back to the
/// legacy variant. These variants cover the cases where no version could be
/// obtained at all.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The connection failed to report its server version.
    #[error("server version query failed on connection '{connection}': {source}")]
    QueryFailed {
        connection: String,
        #[source]
        source: BoxError,
    },

    /// The connection answered with an empty version list.
    #[error("connection '{0}' reported no server version")]
    NoVersionReported(String),
}

// ---------------------------------------------------------------------------
// Timestamp errors
// ---------------------------------------------------------------------------

/// Errors from the timestamp codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// None of the known patterns matched the text.
    #[error("unrecognised timestamp '{0}'")]
    Unparseable(String),

    /// The text names a wall-clock time skipped by a zone transition.
    #[error("timestamp '{0}' does not exist in the requested time zone")]
    NonexistentLocalTime(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ResolutionError::NoVersionReported("dm://build".into());
        assert_eq!(
            err.to_string(),
            "connection 'dm://build' reported no server version"
        );

        let err = TimestampError::Unparseable("yesterday".into());
        assert_eq!(err.to_string(), "unrecognised timestamp 'yesterday'");

        let err = ConfigError::InvalidValue {
            field: "codec.timezone".into(),
            detail: "bad offset".into(),
        };
        assert!(err.to_string().contains("codec.timezone"));
    }

    #[test]
    fn test_query_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let err = ResolutionError::QueryFailed {
            connection: "dm://build".into(),
            source: Box::new(io),
        };
        assert!(err.to_string().contains("socket timeout"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = TimestampError::Unparseable("x".into()).into();
        assert!(matches!(core_err, CoreError::Timestamp(_)));

        let core_err: CoreError = ResolutionError::NoVersionReported("c".into()).into();
        assert!(matches!(core_err, CoreError::Resolution(_)));
    }
}
