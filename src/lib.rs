//! Route interception for browser-style network requests.
//!
//! Pages and contexts register URL-pattern handlers; every request a page
//! issues walks page handlers newest-first, then context handlers
//! newest-first, until one continues, fulfills or aborts it. Falling back
//! defers to the next handler, and running out of handlers sends the request
//! to the network.

// Core subsystems
pub mod dispatch;
pub mod error;
pub mod net;
pub mod route;
pub mod routing;
pub mod scope;

// Front end
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::DispatchConfig;
pub use error::{Error, Result};
pub use http::InterceptServer;
pub use lifecycle::Shutdown;
pub use net::{HttpNetwork, Network};
pub use route::{
    AbortReason, FetchOptions, FulfillResponse, Overrides, Request, ResourceType, Response, Route,
};
pub use routing::{handler_fn, HandlerId, RouteOptions, UnrouteBehavior, UrlPattern};
pub use scope::{Context, ContextOptions, Page, PageEvent};
