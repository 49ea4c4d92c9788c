//! Error types for the unified storage daemon
//!
//! Provides structured error types for all daemon components including
//! the adapter registry, session protocol, and backend transports.

use thiserror::Error;

/// Unified error type for the daemon
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Registry / Dispatch Errors
    // =========================================================================
    #[error("Unsupported scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("Backend unavailable: {backend} - {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Authentication rejected by backend: {backend}")]
    Authentication { backend: String },

    // =========================================================================
    // Session Protocol Errors
    // =========================================================================
    #[error("Operation timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("Session closed: {descriptor}")]
    SessionClosed { descriptor: String },

    #[error("Capability {capability} not supported by system {system_id}")]
    CapabilityUnsupported {
        capability: String,
        system_id: String,
    },

    // =========================================================================
    // Backend Response Errors
    // =========================================================================
    #[error("Backend command failed: {backend} - {code}: {message}")]
    BackendCommand {
        backend: String,
        code: String,
        message: String,
    },

    #[error("Parse error: missing or invalid field '{field}' in: {snippet}")]
    Parse { field: String, snippet: String },

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a caller may reasonably retry the operation after observing
    /// this error. The dispatcher itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::BackendUnavailable { .. }
        )
    }

    /// Whether the error originated on the backend side (as opposed to a
    /// local precondition such as a capability violation).
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable { .. }
                | Error::Authentication { .. }
                | Error::BackendCommand { .. }
                | Error::Parse { .. }
        )
    }

    /// Shorthand for a parse failure naming the missing field and the raw
    /// backend snippet it was expected in.
    pub fn missing_field(field: &str, snippet: &str) -> Self {
        Error::Parse {
            field: field.to_string(),
            snippet: truncate_snippet(snippet),
        }
    }
}

/// Cap raw backend snippets carried in errors to a readable length.
fn truncate_snippet(raw: &str) -> String {
    const MAX: usize = 200;
    let trimmed = raw.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

/// Result type alias for the daemon
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = Error::Timeout {
            operation: "list-pools".into(),
            millis: 5000,
        };
        assert!(timeout.is_retryable());

        let unavailable = Error::BackendUnavailable {
            backend: "smis".into(),
            reason: "connection refused".into(),
        };
        assert!(unavailable.is_retryable());

        let capability = Error::CapabilityUnsupported {
            capability: "volume-resize".into(),
            system_id: "S1".into(),
        };
        assert!(!capability.is_retryable());
        assert!(!capability.is_backend());
    }

    #[test]
    fn test_missing_field_keeps_snippet() {
        let err = Error::missing_field("free_capacity", "Pool: P1\nTotal: 100");
        let msg = err.to_string();
        assert!(msg.contains("free_capacity"));
        assert!(msg.contains("Pool: P1"));
    }

    #[test]
    fn test_snippet_truncated() {
        let long = "x".repeat(500);
        let err = Error::missing_field("id", &long);
        assert!(err.to_string().len() < 300);
    }
}
