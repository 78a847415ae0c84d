//! Routing scopes.
//!
//! # Data Flow
//! ```text
//! Context (context router, network, options)
//!     └── Page (page router, dispatcher, events)
//!             → page.request / goto / fetch
//!             → Dispatcher: page routes newest-first, then context routes
//! ```
//!
//! # Design Decisions
//! - Closing a context closes its pages
//! - Closing never waits on handlers

pub mod context;
pub mod events;
pub mod page;

pub use context::{Context, ContextOptions};
pub use events::PageEvent;
pub use page::{Page, PageId};
