//! HTTP intercept server.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all handler)
//!     → request.rs (target URL, hop-by-hop strip, loop marker)
//!     → Page::request (route chain, then network)
//!     → response.rs (status/headers/body, error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{X_HOP, X_REQUEST_ID};
pub use server::{InterceptServer, InterceptState};
