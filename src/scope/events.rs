//! Page lifecycle events.

use axum::http::StatusCode;

use crate::error::Error;
use crate::route::Request;

/// Emitted on a page's broadcast channel as requests move through it.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// The page issued a request; emitted before any handler runs.
    Request(Request),
    /// A response (network or fulfilled) was delivered.
    RequestFinished { request: Request, status: StatusCode },
    /// The request failed: aborted, timed out, handler error, page closed.
    RequestFailed { request: Request, error: Error },
}

impl PageEvent {
    pub fn request(&self) -> &Request {
        match self {
            PageEvent::Request(request)
            | PageEvent::RequestFinished { request, .. }
            | PageEvent::RequestFailed { request, .. } => request,
        }
    }
}
