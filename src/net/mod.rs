//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (chain exhausted or handler continued)
//!     → Network::fetch(final request)
//!     → client.rs (HTTP/1.1 via hyper-util)
//!     → Response back to the page
//!
//! Route::fetch (handler wants a live response)
//!     → Network::fetch(cumulative request + fetch overrides)
//!     → Response handed to the handler, route still pending
//! ```
//!
//! # Design Decisions
//! - The network is a trait object so tests and embedders can swap it
//! - Bodies are buffered; handlers inspect and rewrite them whole

pub mod client;

use async_trait::async_trait;

use crate::error::Result;
use crate::route::{Request, Response};

pub use client::HttpNetwork;

/// Performs real fetches on behalf of the dispatcher.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}
