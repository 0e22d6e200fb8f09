//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors returned by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required external program or mount is not available.
    #[error("required dependency not found: {tool}")]
    DependencyMissing {
        /// The missing program or path.
        tool: String,
    },

    /// The process lacks the privilege needed to edit a target file.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// What could not be done.
        reason: String,
    },

    /// The HTTP request to the membership API failed.
    #[error("membership request failed: {0}")]
    Fetch(String),

    /// The membership API answered with a non-success status.
    #[error("membership API error ({code}): {message}")]
    Api {
        /// HTTP status code.
        code: u16,
        /// Response body or error message.
        message: String,
    },

    /// The membership API returned a body that is not the expected JSON.
    #[error("malformed membership response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A target file could not be read or written.
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        /// The target file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Invalid or incomplete configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Other filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns `true` for errors that must stop the process before any cycle
    /// runs: missing dependencies, missing privileges and bad configuration.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DependencyMissing { .. } | Self::PermissionDenied { .. } | Self::InvalidConfig(_)
        )
    }

    /// Returns `true` if the error comes from talking to the membership API.
    #[must_use]
    pub const fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Api { .. } | Self::Parse(_))
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io(e) | Self::FileAccess { source: e, .. } => {
                e.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(SyncError::DependencyMissing { tool: "cmd.exe".into() }.is_fatal());
        assert!(SyncError::PermissionDenied { reason: "x".into() }.is_fatal());
        assert!(SyncError::InvalidConfig("api_key".into()).is_fatal());
        assert!(!SyncError::Fetch("timeout".into()).is_fatal());
        assert!(!SyncError::Api { code: 401, message: String::new() }.is_fatal());
    }

    #[test]
    fn fetch_classification() {
        let parse = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        assert!(SyncError::from(parse).is_fetch_error());
        assert!(SyncError::Api { code: 500, message: "boom".into() }.is_fetch_error());
        assert!(!SyncError::InvalidConfig(String::new()).is_fetch_error());
    }

    #[test]
    fn file_access_permission_denied() {
        let err = SyncError::file_access(
            "/etc/hosts",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_permission_denied());
        assert!(err.to_string().starts_with("cannot access /etc/hosts"));
    }
}
