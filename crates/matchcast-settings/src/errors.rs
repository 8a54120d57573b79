//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings layer could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file {}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid JSON or has the wrong shape.
    #[error("failed to parse settings file {}", path.display())]
    Json {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A loaded value the server cannot run with.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted camelCase key, e.g. `server.port`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_error_names_the_file() {
        let err = SettingsError::Io {
            path: PathBuf::from("/etc/matchcast/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read settings file /etc/matchcast/settings.json"
        );
        assert!(err.source().unwrap().to_string().contains("denied"));
    }

    #[test]
    fn json_error_keeps_decode_position() {
        let source = serde_json::from_str::<serde_json::Value>("{\n  oops").unwrap_err();
        let err = SettingsError::Json {
            path: PathBuf::from("settings.json"),
            source,
        };
        assert!(err.to_string().contains("settings.json"));
        assert!(err.source().unwrap().to_string().contains("line 2"));
    }

    #[test]
    fn invalid_value_names_the_field() {
        let err = SettingsError::invalid("server.maxConnections", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid value for server.maxConnections: must be at least 1"
        );
    }
}
