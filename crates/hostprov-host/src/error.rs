//! Error types for hostprov-host

use hostprov_exec::ExecError;
use thiserror::Error;

/// Errors raised while querying or changing the target host
#[derive(Error, Debug, Clone)]
pub enum HostError {
    /// Package not found in any enabled repository
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// Command ran but exited non-zero
    #[error("command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        /// Command line as sent to the host
        command: String,
        /// Exit status
        status: i32,
        /// Error output
        stderr: String,
    },

    /// Host could not be reached or authenticated against
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Execution error from the executor
    #[error("execution error: {0}")]
    Execution(String),

    /// Failed to parse command output
    #[error("parse error: {0}")]
    Parse(String),

    /// Insufficient permissions (need sudo)
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Something the operation depends on is missing
    #[error("unmet precondition: {0}")]
    Precondition(String),
}

impl HostError {
    /// Whether the host itself is gone, as opposed to one operation failing
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, HostError::Unreachable(_))
    }
}

impl From<ExecError> for HostError {
    fn from(err: ExecError) -> Self {
        if err.is_transport() {
            HostError::Unreachable(err.to_string())
        } else {
            HostError::Execution(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_become_unreachable() {
        let err: HostError = ExecError::ConnectionFailed("no route".to_string()).into();
        assert!(err.is_unreachable());

        let err: HostError = ExecError::SpawnError("sh".to_string()).into();
        assert!(!err.is_unreachable());
    }
}
