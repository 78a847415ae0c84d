//! The route handle given to handlers.
//!
//! # Responsibilities
//! - Expose the cumulative request to the handler
//! - Turn continue/fallback/fulfill/abort calls into one `RouteAction`
//! - Fetch through the network without resolving the route
//!
//! # Design Decisions
//! - One resolution slot per handler invocation; a second call is an error
//! - Calls after the owning page closed are no-ops that return `Ok(())`
//! - A dispatcher that stopped listening (timeout) also turns calls into no-ops

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::net::Network;
use crate::resilience::timeouts::with_deadline;
use crate::route::action::{AbortReason, RouteAction};
use crate::route::request::{Overrides, Request};
use crate::route::response::{FulfillResponse, Response};

/// State shared by every invocation of one intercepted request.
pub(crate) struct RouteShared {
    request: Mutex<Request>,
    network: Arc<dyn Network>,
    closed: Shutdown,
    fetch_timeout: Duration,
}

impl RouteShared {
    pub(crate) fn new(
        request: Request,
        network: Arc<dyn Network>,
        closed: Shutdown,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            request: Mutex::new(request),
            network,
            closed,
            fetch_timeout,
        }
    }

    pub(crate) fn replace_request(&self, request: Request) {
        *self.request.lock().unwrap_or_else(PoisonError::into_inner) = request;
    }

    fn request(&self) -> Request {
        self.request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

type Slot = Arc<Mutex<Option<oneshot::Sender<RouteAction>>>>;

/// An intercepted request awaiting a decision from the current handler.
#[derive(Clone)]
pub struct Route {
    shared: Arc<RouteShared>,
    slot: Slot,
}

impl Route {
    pub(crate) fn new(shared: Arc<RouteShared>, decision: oneshot::Sender<RouteAction>) -> Self {
        Self {
            shared,
            slot: Arc::new(Mutex::new(Some(decision))),
        }
    }

    /// The request with every earlier fallback override applied.
    pub fn request(&self) -> Request {
        self.shared.request()
    }

    /// Send the request to the network.
    pub async fn continue_(&self, overrides: Option<Overrides>) -> Result<()> {
        let overrides = overrides.unwrap_or_default();
        if self.is_orphaned() {
            return Ok(());
        }
        self.request().apply_overrides(&overrides)?;
        self.resolve(RouteAction::Continue(overrides))
    }

    /// Defer to the next matching handler, or the network if none is left.
    pub async fn fallback(&self, overrides: Option<Overrides>) -> Result<()> {
        let overrides = overrides.unwrap_or_default();
        if self.is_orphaned() {
            return Ok(());
        }
        self.request().apply_overrides(&overrides)?;
        self.resolve(RouteAction::Fallback(overrides))
    }

    /// Answer the request with a synthetic response.
    pub async fn fulfill(&self, response: FulfillResponse) -> Result<()> {
        if self.is_orphaned() {
            return Ok(());
        }
        self.ensure_pending()?;
        let url = self.request().url().clone();
        let response = response.build(&url).await?;
        self.resolve(RouteAction::Fulfill(response))
    }

    /// Fail the request with a network error, `failed` by default.
    pub async fn abort(&self, reason: Option<AbortReason>) -> Result<()> {
        if self.is_orphaned() {
            return Ok(());
        }
        self.resolve(RouteAction::Abort(reason.unwrap_or_default()))
    }

    /// Perform the request now and return the response; the route stays pending.
    pub async fn fetch(&self, options: Option<FetchOptions>) -> Result<Response> {
        let options = options.unwrap_or_default();
        if self.shared.closed.is_triggered() {
            return Err(Error::TargetClosed("page"));
        }

        let mut request = self.request();
        request.apply_overrides(&options.overrides)?;
        let timeout = options.timeout.unwrap_or(self.shared.fetch_timeout);
        let url = request.url().clone();

        tracing::debug!(request_id = %request.id(), %url, timeout_ms = timeout.as_millis() as u64, "Route fetch");

        let network = Arc::clone(&self.shared.network);
        tokio::select! {
            biased;
            _ = self.shared.closed.wait() => Err(Error::TargetClosed("page")),
            result = with_deadline(timeout, || format!("fetching {url}"), network.fetch(&request)) => result,
        }
    }

    fn is_orphaned(&self) -> bool {
        if self.shared.closed.is_triggered() {
            tracing::debug!("Route resolution after close ignored");
            return true;
        }
        false
    }

    fn ensure_pending(&self) -> Result<()> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            return Err(Error::RouteAlreadyHandled);
        }
        Ok(())
    }

    fn resolve(&self, action: RouteAction) -> Result<()> {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::RouteAlreadyHandled)?;

        let name = action.name();
        if sender.send(action).is_err() {
            tracing::debug!(action = name, "Route no longer awaited, resolution dropped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let request = self.request();
        f.debug_struct("Route")
            .field("method", request.method())
            .field("url", &request.url().as_str())
            .finish()
    }
}

/// Options for `Route::fetch`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub overrides: Overrides,
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.overrides = self.overrides.url(url);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.overrides = self.overrides.method(method);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.overrides = self.overrides.headers(headers);
        self
    }

    pub fn post_data(mut self, body: impl Into<Bytes>) -> Self {
        self.overrides = self.overrides.post_data(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;

    struct EchoNetwork;

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            Ok(Response::new(
                request.url().clone(),
                StatusCode::OK,
                HeaderMap::new(),
                Bytes::from(request.url().path().to_string()),
            ))
        }
    }

    fn route() -> (Route, oneshot::Receiver<RouteAction>, Shutdown) {
        let closed = Shutdown::new();
        let shared = Arc::new(RouteShared::new(
            Request::get("http://localhost/empty.html").unwrap(),
            Arc::new(EchoNetwork),
            closed.clone(),
            Duration::from_secs(5),
        ));
        let (tx, rx) = oneshot::channel();
        (Route::new(shared, tx), rx, closed)
    }

    #[tokio::test]
    async fn second_resolution_is_rejected() {
        let (route, rx, _closed) = route();
        route.abort(None).await.unwrap();

        let err = route.continue_(None).await.unwrap_err();
        assert_eq!(err, Error::RouteAlreadyHandled);
        let err = route.fulfill(FulfillResponse::new()).await.unwrap_err();
        assert_eq!(err, Error::RouteAlreadyHandled);

        assert!(matches!(rx.await.unwrap(), RouteAction::Abort(AbortReason::Failed)));
    }

    #[tokio::test]
    async fn invalid_override_leaves_route_pending() {
        let (route, rx, _closed) = route();
        let err = route
            .fallback(Some(Overrides::new().url("ftp://localhost/")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        route.fallback(None).await.unwrap();
        assert!(matches!(rx.await.unwrap(), RouteAction::Fallback(_)));
    }

    #[tokio::test]
    async fn resolutions_after_close_are_noops() {
        let (route, mut rx, closed) = route();
        closed.trigger();

        route.continue_(None).await.unwrap();
        route.fallback(None).await.unwrap();
        route.fulfill(FulfillResponse::new()).await.unwrap();
        route.abort(None).await.unwrap();
        assert!(rx.try_recv().is_err());

        let err = route.fetch(None).await.unwrap_err();
        assert_eq!(err, Error::TargetClosed("page"));
    }

    #[tokio::test]
    async fn fetch_does_not_resolve() {
        let (route, rx, _closed) = route();
        let response = route
            .fetch(Some(FetchOptions::new().url("/other.html")))
            .await
            .unwrap();
        assert_eq!(response.text(), "/other.html");

        route
            .fulfill(FulfillResponse::new().response(response).status(201))
            .await
            .unwrap();
        match rx.await.unwrap() {
            RouteAction::Fulfill(response) => {
                assert_eq!(response.status(), StatusCode::CREATED);
                assert_eq!(response.text(), "/other.html");
                assert_eq!(response.url().as_str(), "http://localhost/empty.html");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
