//! Per-scope routing table.
//!
//! # Responsibilities
//! - Store registrations newest-first
//! - Hand dispatchers an immutable snapshot of the table
//! - Remove registrations by id, by pattern, or all at once
//!
//! # Design Decisions
//! - Copy-on-write via `ArcSwap`: dispatch never blocks on route/unroute
//! - A dispatch keeps the snapshot it started with; removals only affect
//!   dispatches that start later
//! - Teardown of removed registrations happens outside the table

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use url::Url;

use crate::error::Result;
use crate::routing::handler::{HandlerId, Registration, RouteHandler, RouteOptions, UnrouteBehavior};
use crate::routing::matcher::UrlPattern;

/// Snapshot of a table, newest registration first.
pub type RouteSnapshot = Arc<Vec<Arc<Registration>>>;

/// Routing table owned by a page or a context.
#[derive(Debug)]
pub struct Router {
    entries: ArcSwap<Vec<Arc<Registration>>>,
    base_url: Option<Url>,
}

impl Router {
    pub fn new(base_url: Option<Url>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            base_url,
        }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Compile and prepend a registration.
    pub fn register(
        &self,
        pattern: UrlPattern,
        handler: RouteHandler,
        options: RouteOptions,
    ) -> Result<HandlerId> {
        let registration = Arc::new(Registration::new(
            &pattern,
            self.base_url.as_ref(),
            handler,
            options,
        )?);
        let id = registration.id();

        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.push(Arc::clone(&registration));
            next.extend(current.iter().cloned());
            next
        });

        tracing::debug!(handler_id = %id, %pattern, times = ?options.times, "Route registered");
        Ok(id)
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        self.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Remove one registration by id.
    pub fn remove(&self, id: HandlerId) -> Option<Arc<Registration>> {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|r| r.id() != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().find(|r| r.id() == id).cloned()
    }

    /// Remove registrations whose pattern equals `pattern`, optionally only
    /// the one registered as `handler`.
    pub fn unroute(&self, pattern: &UrlPattern, handler: Option<HandlerId>) -> Vec<Arc<Registration>> {
        let selected = |r: &Arc<Registration>| {
            r.pattern() == pattern && handler.map_or(true, |id| r.id() == id)
        };

        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|r| !selected(*r))
                .cloned()
                .collect::<Vec<_>>()
        });

        let removed: Vec<_> = previous.iter().filter(|r| selected(*r)).cloned().collect();
        tracing::debug!(%pattern, removed = removed.len(), "Routes unregistered");
        removed
    }

    /// Empty the table, then tear down what was removed according to `behavior`.
    pub async fn unroute_all(&self, behavior: UnrouteBehavior) -> Result<()> {
        let removed = self.entries.swap(Arc::new(Vec::new()));
        tracing::debug!(removed = removed.len(), ?behavior, "Unrouting all handlers");

        let results = join_all(removed.iter().map(|r| r.stop(behavior))).await;
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(None)
    }
}
