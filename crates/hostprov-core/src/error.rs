//! Core error types for hostprov-core

use thiserror::Error;

use crate::report::RunReport;

/// Errors that stop a run or prevent one from starting
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Variables or target settings are invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// A line-matching pattern does not compile
    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// A template failed to parse or render
    #[error("template error: {0}")]
    Template(String),

    /// An action failed and was not marked to ignore errors
    #[error("action `{action}` failed: {message}")]
    ActionFailed {
        /// Name of the failing action
        action: String,
        /// Failure description
        message: String,
        /// Outcomes up to and including the failure
        report: Box<RunReport>,
    },

    /// The host stopped answering; ignore-errors does not apply
    #[error("host unreachable during `{action}`: {message}")]
    Unreachable {
        /// Action being executed
        action: String,
        /// Transport error
        message: String,
        /// Outcomes up to and including the failure
        report: Box<RunReport>,
    },
}

impl CoreError {
    /// Partial report for errors raised mid-run
    #[must_use]
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            CoreError::ActionFailed { report, .. } | CoreError::Unreachable { report, .. } => {
                Some(report)
            }
            _ => None,
        }
    }
}

impl From<minijinja::Error> for CoreError {
    fn from(err: minijinja::Error) -> Self {
        CoreError::Template(err.to_string())
    }
}
