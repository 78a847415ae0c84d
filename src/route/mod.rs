//! Intercepted request model.
//!
//! # Data Flow
//! ```text
//! Page::request(Request)
//!     → dispatcher snapshots routing tables
//!     → handler receives a Route (handle.rs)
//!     → handler calls continue_/fallback/fulfill/abort
//!     → RouteAction (action.rs) delivered to the dispatcher
//!     → Response (response.rs) or Error::Aborted
//! ```
//!
//! # Design Decisions
//! - Handlers never mutate dispatcher state directly; they emit one `RouteAction`
//! - Overrides are validated when the handler calls the route, not later
//! - Fulfilled bodies are materialized before the action is sent

pub mod action;
pub mod handle;
pub mod request;
pub mod response;

pub use action::{AbortReason, RouteAction};
pub use handle::{FetchOptions, Route};
pub use request::{Overrides, Request, RequestId, ResourceType};
pub use response::{FulfillResponse, Response};
