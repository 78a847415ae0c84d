//! Crate-wide error type.
//!
//! # Design Decisions
//! - One flat enum for every dispatch-time failure
//! - `Clone` so a single handler failure can be reported both to the
//!   request that triggered it and to an `unroute_all` caller
//! - Configuration errors live in `config::loader` and are not part of this enum

use thiserror::Error;

use crate::route::AbortReason;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// URL pattern could not be compiled.
    #[error("invalid url pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Option or override value rejected before anything was dispatched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A second resolving call was made for the same handler invocation.
    #[error("Route is already handled!")]
    RouteAlreadyHandled,

    /// A route handler returned an error, panicked, or dropped its route.
    #[error("route handler failed: {0}")]
    Handler(String),

    /// A deadline expired.
    #[error("Timeout {timeout_ms}ms exceeded while {operation}")]
    Timeout { timeout_ms: u64, operation: String },

    /// The owning page or context has been closed.
    #[error("Target {0} has been closed")]
    TargetClosed(&'static str),

    /// The request was aborted by a route handler.
    #[error("{0}")]
    Aborted(AbortReason),

    /// The network collaborator failed to complete the request.
    #[error("network error: {0}")]
    Network(String),
}

impl Error {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(timeout: std::time::Duration, operation: impl Into<String>) -> Self {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            operation: operation.into(),
        }
    }

    /// Report a handler's own error as a handler failure.
    pub fn into_handler(self) -> Self {
        match self {
            Error::Handler(_) => self,
            other => Error::Handler(other.to_string()),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidPattern { .. } => "invalid_pattern",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::RouteAlreadyHandled => "already_handled",
            Error::Handler(_) => "handler",
            Error::Timeout { .. } => "timeout",
            Error::TargetClosed(_) => "closed",
            Error::Aborted(_) => "aborted",
            Error::Network(_) => "network",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
