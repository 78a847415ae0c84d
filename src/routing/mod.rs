//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! page.route(pattern, handler, options) / context.route(...)
//!     → matcher.rs (compile glob/regex/exact/predicate, resolve base URL)
//!     → handler.rs (Registration: id, cap, in-flight tracker)
//!     → router.rs (prepend to copy-on-write table)
//!
//! Dispatch:
//!     → router.snapshot() for page and context
//!     → dispatch::Chain walks page newest-first, then context newest-first
//!
//! Configuration:
//!     [[rules]] → rules.rs → context routes
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at registration; dispatch never sees a syntax error
//! - Tables are immutable snapshots; route/unroute swap in a new one
//! - Last registered wins (tried first)

pub mod handler;
pub mod matcher;
pub mod router;
pub mod rules;
pub mod tracker;

pub use handler::{handler_fn, HandlerId, Registration, RouteHandler, RouteOptions, UnrouteBehavior};
pub use matcher::{glob_to_regex, CompiledPattern, Matcher, UrlPattern};
pub use router::{RouteSnapshot, Router};
pub use rules::{install_rules, reload_rules};
pub use tracker::{InvocationGuard, InvocationId, InvocationTracker};
