//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap page requests, route fetches and request waits with a deadline
//! - Report the deadline and the interrupted operation in the error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from handler and network errors
//! - The operation label is built lazily, only when the deadline fires

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut` with a deadline.
pub async fn with_deadline<T, F, L>(timeout: Duration, label: L, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
    L: FnOnce() -> String,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            let operation = label();
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, %operation, "Deadline exceeded");
            Err(Error::timeout(timeout, operation))
        }
    }
}
