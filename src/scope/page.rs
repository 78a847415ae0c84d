//! Pages: the narrowest routing scope.
//!
//! # Responsibilities
//! - Own the page routing table
//! - Issue requests through the dispatcher under the request deadline
//! - Broadcast request events and serve `wait_for_request`
//! - Close without waiting on handlers
//!
//! # Design Decisions
//! - Close wins every race: a closed page fails pending requests with
//!   `TargetClosed` even while a handler is suspended
//! - The page holds its context weakly; the context owns its pages

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use axum::http::Method;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

use crate::config::TimeoutConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::route::{Request, ResourceType, Response};
use crate::routing::{HandlerId, RouteHandler, RouteOptions, Router, UnrouteBehavior, UrlPattern};
use crate::scope::context::ContextInner;
use crate::scope::events::PageEvent;
use crate::scope::Context;

static PAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u64);

impl PageId {
    fn next() -> Self {
        Self(PAGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

struct PageInner {
    id: PageId,
    router: Arc<Router>,
    dispatcher: Dispatcher,
    timeouts: TimeoutConfig,
    base_url: Option<Url>,
    closed: Shutdown,
    events: broadcast::Sender<PageEvent>,
    context: Weak<ContextInner>,
}

/// A page of a browser context. Cheap to clone.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    pub(crate) fn new(context: &Arc<ContextInner>) -> Self {
        let base_url = context.options.base_url.clone();
        let router = Arc::new(Router::new(base_url.clone()));
        let closed = Shutdown::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&router),
            Arc::clone(&context.router),
            Arc::clone(&context.network),
            closed.clone(),
            context.options.timeouts.fetch(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(PageInner {
                id: PageId::next(),
                router,
                dispatcher,
                timeouts: context.options.timeouts.clone(),
                base_url,
                closed,
                events,
                context: Arc::downgrade(context),
            }),
        }
    }

    pub fn id(&self) -> PageId {
        self.inner.id
    }

    /// The owning context, unless it has been dropped.
    pub fn context(&self) -> Option<Context> {
        self.inner.context.upgrade().map(Context::from_inner)
    }

    pub fn route(&self, pattern: impl Into<UrlPattern>, handler: RouteHandler) -> Result<HandlerId> {
        self.route_with_options(pattern, handler, RouteOptions::default())
    }

    pub fn route_with_options(
        &self,
        pattern: impl Into<UrlPattern>,
        handler: RouteHandler,
        options: RouteOptions,
    ) -> Result<HandlerId> {
        self.ensure_open()?;
        self.inner.router.register(pattern.into(), handler, options)
    }

    /// Remove routes registered with an equal pattern, or only `handler`.
    pub fn unroute(&self, pattern: impl Into<UrlPattern>, handler: Option<HandlerId>) -> Result<()> {
        let pattern = pattern.into();
        pattern.compile(self.inner.base_url.as_ref())?;
        self.inner.router.unroute(&pattern, handler);
        Ok(())
    }

    pub async fn unroute_all(&self, behavior: UnrouteBehavior) -> Result<()> {
        self.inner.router.unroute_all(behavior).await
    }

    /// Issue `request` through the route chain.
    pub async fn request(&self, request: Request) -> Result<Response> {
        self.ensure_open()?;

        let start = Instant::now();
        let timeout = self.inner.timeouts.request();
        let url = request.url().clone();
        self.emit(PageEvent::Request(request.clone()));

        let result = tokio::select! {
            biased;
            _ = self.inner.closed.wait() => Err(Error::TargetClosed("page")),
            result = with_deadline(
                timeout,
                || format!("requesting {url}"),
                self.inner.dispatcher.dispatch(request.clone()),
            ) => result,
        };

        match &result {
            Ok(response) => {
                metrics::record_request("success", start);
                tracing::debug!(
                    page_id = %self.inner.id,
                    request_id = %request.id(),
                    %url,
                    status = response.status().as_u16(),
                    fulfilled = response.is_fulfilled(),
                    "Request finished"
                );
                self.emit(PageEvent::RequestFinished {
                    request,
                    status: response.status(),
                });
            }
            Err(error) => {
                metrics::record_request(error.kind(), start);
                tracing::debug!(
                    page_id = %self.inner.id,
                    request_id = %request.id(),
                    %url,
                    %error,
                    "Request failed"
                );
                self.emit(PageEvent::RequestFailed {
                    request,
                    error: error.clone(),
                });
            }
        }
        result
    }

    /// Navigate: a `document` GET, relative URLs resolved against the base URL.
    pub async fn goto(&self, url: &str) -> Result<Response> {
        let url = self.resolve(url)?;
        self.request(Request::new(Method::GET, url).with_resource_type(ResourceType::Document))
            .await
    }

    /// A `fetch` GET, relative URLs resolved against the base URL.
    pub async fn fetch(&self, url: &str) -> Result<Response> {
        let url = self.resolve(url)?;
        self.request(Request::new(Method::GET, url)).await
    }

    /// Subscribe to request events.
    pub fn events(&self) -> broadcast::Receiver<PageEvent> {
        self.inner.events.subscribe()
    }

    /// Wait for the next request whose URL matches `pattern`.
    ///
    /// The subscription is taken before this returns, so a request issued
    /// after the call is observed even if the future is polled later.
    pub fn wait_for_request(
        &self,
        pattern: impl Into<UrlPattern>,
        timeout: Option<Duration>,
    ) -> Result<impl Future<Output = Result<Request>> + Send + 'static> {
        let pattern = pattern.into();
        let matcher = pattern.compile(self.inner.base_url.as_ref())?;
        let mut events = self.inner.events.subscribe();
        let closed = self.inner.closed.clone();
        let timeout = timeout.unwrap_or_else(|| self.inner.timeouts.request());
        let operation = format!("waiting for request {pattern}");

        Ok(async move {
            let next_match = async {
                loop {
                    match events.recv().await {
                        Ok(PageEvent::Request(request)) if matcher.matches(request.url()) => {
                            return Ok(request);
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Page event subscriber lagged");
                        }
                        Err(RecvError::Closed) => return Err(Error::TargetClosed("page")),
                    }
                }
            };

            tokio::select! {
                biased;
                _ = closed.wait() => Err(Error::TargetClosed("page")),
                result = with_deadline(timeout, || operation, next_match) => result,
            }
        })
    }

    /// Close the page. Pending requests fail, handlers are left running.
    pub fn close(&self) {
        if !self.inner.closed.trigger() {
            return;
        }
        tracing::debug!(page_id = %self.inner.id, routes = self.inner.router.len(), "Page closed");
        if let Some(context) = self.inner.context.upgrade() {
            context.pages.remove(&self.inner.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_triggered()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TargetClosed("page"));
        }
        Ok(())
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        let parsed = match &self.inner.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|e| Error::InvalidArgument(format!("invalid url {url:?}: {e}")))
    }

    fn emit(&self, event: PageEvent) {
        // No subscribers is the common case.
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.inner.id)
            .field("routes", &self.inner.router.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
