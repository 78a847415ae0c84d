//! Drives a `Chain` for one request.
//!
//! # Data Flow
//! ```text
//! Page::request
//!     → Dispatcher::dispatch
//!         → Chain::next_candidate ─┬─ none left → Network::fetch
//!         │                        └─ Invocation
//!         → Registration::invoke (spawned task)
//!         → await decision / handler exit
//!         → Chain::apply → Next | Network | Fulfilled | Aborted
//! ```
//!
//! # Design Decisions
//! - Handlers run on their own tasks; dropping the dispatch future (page
//!   close, request timeout) never cancels a handler
//! - A decision wins over a handler exit observed in the same poll

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

use crate::dispatch::chain::{Chain, ScopeKind, Step};
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::net::Network;
use crate::observability::metrics;
use crate::route::handle::RouteShared;
use crate::route::{Overrides, Request, Response, Route, RouteAction};
use crate::routing::handler::Registration;
use crate::routing::Router;

/// Routes requests of one page through its page and context tables.
#[derive(Clone)]
pub struct Dispatcher {
    page: Arc<Router>,
    context: Arc<Router>,
    network: Arc<dyn Network>,
    closed: Shutdown,
    fetch_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        page: Arc<Router>,
        context: Arc<Router>,
        network: Arc<dyn Network>,
        closed: Shutdown,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            page,
            context,
            network,
            closed,
            fetch_timeout,
        }
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        let request_id = request.id();
        let mut chain = Chain::new(request, &self.page.snapshot(), &self.context.snapshot());
        let shared = Arc::new(RouteShared::new(
            chain.request().clone(),
            Arc::clone(&self.network),
            self.closed.clone(),
            self.fetch_timeout,
        ));

        tracing::debug!(
            %request_id,
            url = %chain.request().url(),
            candidates = chain.remaining(),
            "Dispatching request"
        );

        while let Some(invocation) = chain.next_candidate() {
            let registration = invocation.registration;
            if invocation.exhausted {
                self.router(invocation.scope).remove(registration.id());
            }

            shared.replace_request(chain.request().clone());
            let (tx, rx) = oneshot::channel();
            let handle = registration.invoke(Route::new(Arc::clone(&shared), tx));
            metrics::record_invocation(invocation.scope.as_str());

            let action = await_decision(&registration, handle, rx).await?;
            tracing::debug!(
                %request_id,
                handler_id = %registration.id(),
                scope = invocation.scope.as_str(),
                action = action.name(),
                "Route handler decided"
            );

            match chain.apply(action)? {
                Step::Next => continue,
                Step::Network(request) => return self.network.fetch(&request).await,
                Step::Fulfilled(response) => return Ok(response),
                Step::Aborted(reason) => return Err(Error::Aborted(reason)),
            }
        }

        let request = chain.into_request();
        tracing::debug!(%request_id, url = %request.url(), "No handler left, fetching from network");
        self.network.fetch(&request).await
    }

    fn router(&self, scope: ScopeKind) -> &Router {
        match scope {
            ScopeKind::Page => &self.page,
            ScopeKind::Context => &self.context,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("page_routes", &self.page.len())
            .field("context_routes", &self.context.len())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

/// Wait for the handler's decision.
///
/// Handler failures turn into fallbacks once `unroute_all(IgnoreErrors)` has
/// started tearing the registration down.
async fn await_decision(
    registration: &Registration,
    mut handle: JoinHandle<Result<()>>,
    mut decision: oneshot::Receiver<RouteAction>,
) -> Result<RouteAction> {
    let joined = tokio::select! {
        biased;
        decided = &mut decision => match decided {
            Ok(action) => return Ok(action),
            // Every route clone is gone; the task outcome says why.
            Err(_) => handle.await,
        },
        joined = &mut handle => joined,
    };

    if let Some(error) = failure(joined) {
        if registration.ignores_errors() {
            tracing::debug!(handler_id = %registration.id(), %error, "Handler error ignored, falling back");
            return Ok(RouteAction::Fallback(Overrides::default()));
        }
        tracing::warn!(handler_id = %registration.id(), %error, "Route handler failed");
        return Err(error);
    }

    // The handler returned; a clone of its route may still resolve.
    decision.await.or_else(|_| unhandled(registration))
}

fn failure(joined: std::result::Result<Result<()>, JoinError>) -> Option<Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.into_handler()),
        Err(e) if e.is_panic() => Some(Error::Handler("route handler panicked".into())),
        Err(_) => Some(Error::Handler("route handler was cancelled".into())),
    }
}

fn unhandled(registration: &Registration) -> Result<RouteAction> {
    if registration.ignores_errors() {
        return Ok(RouteAction::Fallback(Overrides::default()));
    }
    Err(Error::Handler("route was not handled".into()))
}
