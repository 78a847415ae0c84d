//! Browser contexts: the outer routing scope.
//!
//! Context routes apply to every page of the context and are tried after the
//! page's own routes.

use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::config::{DispatchConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::net::Network;
use crate::routing::{HandlerId, RouteHandler, RouteOptions, Router, UnrouteBehavior, UrlPattern};
use crate::scope::page::{Page, PageId};

/// Settings shared by every page of a context.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub base_url: Option<Url>,
    pub timeouts: TimeoutConfig,
}

impl ContextOptions {
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let base_url = config
            .context
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::InvalidArgument(format!("invalid base url: {e}")))?;

        Ok(Self {
            base_url,
            timeouts: config.timeouts.clone(),
        })
    }

    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }
}

pub(crate) struct ContextInner {
    pub(crate) router: Arc<Router>,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) options: ContextOptions,
    pub(crate) pages: DashMap<PageId, Page>,
    closed: Shutdown,
}

/// A browser context. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new(network: Arc<dyn Network>, options: ContextOptions) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                router: Arc::new(Router::new(options.base_url.clone())),
                network,
                options,
                pages: DashMap::new(),
                closed: Shutdown::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.inner.options
    }

    pub fn new_page(&self) -> Result<Page> {
        self.ensure_open()?;
        let page = Page::new(&self.inner);
        self.inner.pages.insert(page.id(), page.clone());
        tracing::debug!(page_id = %page.id(), "Page opened");
        Ok(page)
    }

    /// Open pages, in no particular order.
    pub fn pages(&self) -> Vec<Page> {
        self.inner.pages.iter().map(|entry| entry.value().clone()).collect()
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

    pub fn unroute(&self, pattern: impl Into<UrlPattern>, handler: Option<HandlerId>) -> Result<()> {
        let pattern = pattern.into();
        pattern.compile(self.inner.options.base_url.as_ref())?;
        self.inner.router.unroute(&pattern, handler);
        Ok(())
    }

    pub async fn unroute_all(&self, behavior: UnrouteBehavior) -> Result<()> {
        self.inner.router.unroute_all(behavior).await
    }

    /// Number of context-level routes.
    pub fn route_count(&self) -> usize {
        self.inner.router.len()
    }

    /// Close the context and every page in it.
    pub fn close(&self) {
        if !self.inner.closed.trigger() {
            return;
        }
        // Collect first: page close removes itself from the map.
        let pages = self.pages();
        for page in &pages {
            page.close();
        }
        tracing::debug!(pages = pages.len(), "Context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_triggered()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TargetClosed("context"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.inner.options)
            .field("routes", &self.inner.router.len())
            .field("pages", &self.inner.pages.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
