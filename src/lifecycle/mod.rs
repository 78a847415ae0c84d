//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Close (shutdown.rs):
//!     page.close() / context.close() / server stop
//!     → Shutdown::trigger
//!     → pending requests, route fetches and waits observe it
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful server shutdown
//! ```
//!
//! # Design Decisions
//! - One signal type for page close, context close and process shutdown
//! - Late subscribers see an already-triggered signal

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
