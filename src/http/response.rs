//! Response conversion and error mapping.
//!
//! # Responsibilities
//! - Turn a dispatched `Response` into an HTTP response for the client
//! - Map dispatch errors to status codes
//!
//! # Design Decisions
//! - Hop-by-hop headers and `Content-Length` are dropped; hyper recomputes
//!   the length from the buffered body
//! - Aborted requests answer 502 with the net error as body
//! - Timeouts result in 504 Gateway Timeout, closed targets in 503

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};

use crate::error::Error;
use crate::http::request::strip_hop_by_hop;
use crate::route::Response;

pub fn into_http_response(response: Response) -> HttpResponse {
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut http = HttpResponse::new(Body::from(response.body().clone()));
    *http.status_mut() = response.status();
    *http.headers_mut() = headers;
    http
}

pub fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Aborted(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::TargetClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: &Error) -> HttpResponse {
    (error_status(error), error.to_string()).into_response()
}

pub fn loop_detected() -> HttpResponse {
    (StatusCode::LOOP_DETECTED, "request was routed back to the intercept server").into_response()
}
