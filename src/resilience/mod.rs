//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Page request / Route::fetch / wait_for_request:
//!     → timeouts.rs (enforce the configured deadline)
//!     → Error::Timeout naming the deadline and the operation
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every wait on a handler or the network has a deadline
//! - No retries: a handler decides what a failed fetch means

pub mod timeouts;

pub use timeouts::with_deadline;
