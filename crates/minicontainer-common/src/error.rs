//! Unified error types for the minicontainer workspace.
//!
//! Every library crate returns [`Result`]; the CLI edge converts to a single
//! `error:`-prefixed diagnostic line and exit code 1.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MinicontainerError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A prefix query matched more than one resource.
    #[error("ambiguous {kind} reference {query}: {matches} matches")]
    Ambiguous {
        /// Type of the queried resource.
        kind: &'static str,
        /// The query that was ambiguous.
        query: String,
        /// Number of resources that matched.
        matches: usize,
    },

    /// A resource with the same identifier already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Type of the conflicting resource.
        kind: &'static str,
        /// Identifier of the conflicting resource.
        id: String,
    },

    /// A permission or capability error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// A system call failed.
    #[error("{op} failed: {source}")]
    Syscall {
        /// Name of the failed operation (e.g. `mount`, `pivot_root`).
        op: &'static str,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A registry request failed.
    #[error("registry error: {message}")]
    Registry {
        /// Description of the registry failure.
        message: String,
    },

    /// A digest validation failed.
    #[error("digest mismatch for {resource}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected digest value.
        expected: String,
        /// Actual computed digest value.
        actual: String,
    },

    /// The requested operation is not supported.
    #[error("unsupported: {message}")]
    Unsupported {
        /// Description of the unsupported operation.
        message: String,
    },

    /// A persisted record could not be interpreted.
    #[error("corrupt state at {path}: {message}")]
    StateCorrupt {
        /// Path of the corrupt record.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// The operation conflicts with the resource's current state.
    #[error("{message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MinicontainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_message() {
        let err = MinicontainerError::Config {
            message: "bad value".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("bad value"));
    }

    #[test]
    fn not_found_error_display_kind_and_id() {
        let err = MinicontainerError::NotFound {
            kind: "container",
            id: "abc".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("container"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn ambiguous_error_display_match_count() {
        let err = MinicontainerError::Ambiguous {
            kind: "container",
            query: "ab".into(),
            matches: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("ambiguous"));
        assert!(msg.contains("3 matches"));
    }

    #[test]
    fn digest_mismatch_error_display() {
        let err = MinicontainerError::DigestMismatch {
            resource: "layer.tar".into(),
            expected: "sha256:aaa".into(),
            actual: "sha256:bbb".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("layer.tar"));
        assert!(msg.contains("sha256:aaa"));
        assert!(msg.contains("sha256:bbb"));
    }

    #[test]
    fn serialization_error_from_serde_json() {
        let bad_json = "not json";
        let serde_err = serde_json::from_str::<serde_json::Value>(bad_json).unwrap_err();
        let err: MinicontainerError = serde_err.into();
        assert!(matches!(err, MinicontainerError::Serialization { .. }));
    }
}
