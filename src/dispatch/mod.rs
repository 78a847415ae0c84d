//! Request dispatch through the handler chain.
//!
//! # Design Decisions
//! - `chain.rs` is the pure core: ordering, matching, caps, override folding
//! - `dispatcher.rs` adds tasks, channels and the network

pub mod chain;
pub mod dispatcher;

pub use chain::{Chain, Invocation, ScopeKind, Step};
pub use dispatcher::Dispatcher;
