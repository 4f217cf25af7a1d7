//! Error types for remote source operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`Remote`](crate::Remote) and the source parser.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The reference is not a parseable remote reference.
    ///
    /// [`Remote::locate`](crate::Remote::locate) treats this as "use the
    /// reference as a local path".
    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    /// A direct `scheme://` reference used a scheme other than s3, http or https.
    #[error("Unsupported scheme '{scheme}' in {reference}: expected one of s3, http, https")]
    UnsupportedScheme {
        /// Scheme found in the reference
        scheme: String,
        /// The offending reference
        reference: String,
    },

    /// A plain file occupies the directory a cache entry should live in.
    #[error(
        "{} is not a directory. Please remove it so that it can be used for dependency caching",
        path.display()
    )]
    CachePathConflict {
        /// Cache path relative to the cache home
        path: PathBuf,
    },

    /// A retrieval strategy failed.
    #[error("Failed to retrieve {reference}: {source}")]
    Retrieval {
        /// Reference being retrieved (query redacted)
        reference: String,
        /// Underlying strategy failure
        #[source]
        source: RetrievalError,
    },

    /// A retrieval strategy failed and the partial cache entry could not be removed.
    #[error("Failed to retrieve {reference}: {source}; additionally failed to clean up: {cleanup}")]
    RetrievalCleanup {
        /// Reference being retrieved (query redacted)
        reference: String,
        /// Underlying strategy failure
        #[source]
        source: RetrievalError,
        /// Error raised while removing the partial cache entry
        cleanup: std::io::Error,
    },

    /// Remote sources are disabled by configuration.
    #[error("Remote sources are disabled due to '{var}'")]
    Disabled {
        /// Name of the setting that disabled remote sources
        var: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A per-key cache lock was poisoned by a panicking thread.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether this error means "not a remote reference".
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, RemoteError::InvalidUrl(_))
    }
}

/// Errors raised by a [`Getter`](crate::getter::Getter) while retrieving a source.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Non-success HTTP status
    #[error("HTTP error: {status} fetching {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Git error
    #[error("Git error: {0}")]
    Git(String),

    /// Object storage error
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Archive extraction error
    #[error("Failed to extract archive: {0}")]
    Archive(String),

    /// The source names a getter this crate cannot handle.
    #[error("Unsupported getter: {0}")]
    UnsupportedGetter(String),

    /// Path not found in archive or repository
    #[error("Path not found: {path} in {location}")]
    PathNotFound {
        /// Path that was not found
        path: String,
        /// Location where path was expected
        location: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for remote source operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_conflict_display() {
        let error = RemoteError::CachePathConflict {
            path: PathBuf::from("https_example_com_repo"),
        };
        let display = error.to_string();
        assert!(display.contains("https_example_com_repo"));
        assert!(display.contains("is not a directory"));
    }

    #[test]
    fn test_retrieval_cleanup_reports_both_errors() {
        let error = RemoteError::RetrievalCleanup {
            reference: "git::https://example.com/repo.git".to_string(),
            source: RetrievalError::Git("clone failed".to_string()),
            cleanup: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = error.to_string();
        assert!(display.contains("clone failed"));
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_is_invalid_url() {
        assert!(RemoteError::InvalidUrl("missing scheme".into()).is_invalid_url());
        assert!(!RemoteError::Config("bad".into()).is_invalid_url());
    }
}
