//! Handler registrations.
//!
//! # Responsibilities
//! - Pair a compiled pattern with a user handler and an optional invocation cap
//! - Spawn handler invocations and track them while they run
//! - Implement the per-registration side of `unroute_all` teardown

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{Error, Result};
use crate::route::Route;
use crate::routing::matcher::{CompiledPattern, UrlPattern};
use crate::routing::tracker::InvocationTracker;

static HANDLER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one `route()` registration, for targeted `unroute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        Self(HANDLER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// Type-erased route handler.
pub type RouteHandler = Arc<dyn Fn(Route) -> HandlerFuture + Send + Sync>;

/// Box an async closure into a `RouteHandler`.
pub fn handler_fn<F, Fut>(f: F) -> RouteHandler
where
    F: Fn(Route) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |route: Route| -> HandlerFuture { Box::pin(f(route)) })
}

/// Options for `route()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteOptions {
    /// Invoke the handler at most this many times, then drop the registration.
    pub times: Option<usize>,
}

impl RouteOptions {
    pub fn times(times: usize) -> Self {
        Self { times: Some(times) }
    }
}

/// How `unroute_all` treats handlers that are still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrouteBehavior {
    /// Return immediately; running handlers keep going and their decisions still apply.
    #[default]
    Default,
    /// Wait for running handlers; report the first error they raise.
    Wait,
    /// Wait for running handlers; swallow their errors.
    IgnoreErrors,
}

/// Outcome of reserving one invocation on a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Invocation granted; more may follow.
    Granted,
    /// Invocation granted and the cap is now used up.
    Last,
    /// No invocations left.
    Exhausted,
}

/// One entry of a routing table.
pub struct Registration {
    id: HandlerId,
    pattern: CompiledPattern,
    handler: RouteHandler,
    remaining: Option<AtomicUsize>,
    tracker: InvocationTracker,
    stopping: AtomicBool,
    ignore_errors: AtomicBool,
    failures: Mutex<Vec<Error>>,
}

impl Registration {
    pub fn new(
        pattern: &UrlPattern,
        base_url: Option<&Url>,
        handler: RouteHandler,
        options: RouteOptions,
    ) -> Result<Self> {
        if options.times == Some(0) {
            return Err(Error::InvalidArgument("times must be at least 1".into()));
        }

        Ok(Self {
            id: HandlerId::next(),
            pattern: pattern.compile(base_url)?,
            handler,
            remaining: options.times.map(AtomicUsize::new),
            tracker: InvocationTracker::new(),
            stopping: AtomicBool::new(false),
            ignore_errors: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn pattern(&self) -> &UrlPattern {
        self.pattern.pattern()
    }

    pub fn matches(&self, url: &Url) -> bool {
        self.pattern.matches(url)
    }

    /// Invocations left, `None` when unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining.as_ref().map(|r| r.load(Ordering::SeqCst))
    }

    pub fn active_invocations(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn ignores_errors(&self) -> bool {
        self.ignore_errors.load(Ordering::SeqCst)
    }

    /// Reserve one invocation against the cap.
    pub fn claim(&self) -> Claim {
        let Some(remaining) = &self.remaining else {
            return Claim::Granted;
        };

        let mut current = remaining.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return Claim::Exhausted;
            }
            match remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) if current == 1 => return Claim::Last,
                Ok(_) => return Claim::Granted,
                Err(actual) => current = actual,
            }
        }
    }

    /// Run the handler for `route` on its own task.
    ///
    /// The task outlives the dispatcher if the page closes or the request
    /// times out, so late resolution calls from the handler stay harmless.
    pub(crate) fn invoke(self: &Arc<Self>, route: Route) -> JoinHandle<Result<()>> {
        let guard = self.tracker.track();
        let registration = Arc::clone(self);

        tracing::trace!(
            handler_id = %self.id,
            invocation_id = %guard.id(),
            pattern = %self.pattern(),
            "Invoking route handler"
        );

        tokio::spawn(async move {
            let result = (registration.handler)(route).await;
            if let Err(e) = &result {
                if registration.stopping.load(Ordering::SeqCst) {
                    registration
                        .failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(e.clone());
                }
            }
            drop(guard);
            result
        })
    }

    /// Teardown after the registration left its table.
    pub(crate) async fn stop(&self, behavior: UnrouteBehavior) -> Result<()> {
        match behavior {
            UnrouteBehavior::Default => Ok(()),
            UnrouteBehavior::Wait => {
                self.stopping.store(true, Ordering::SeqCst);
                self.tracker.wait_idle().await;
                let failures = self.take_failures();
                match failures.into_iter().next() {
                    Some(first) => Err(first.into_handler()),
                    None => Ok(()),
                }
            }
            UnrouteBehavior::IgnoreErrors => {
                self.ignore_errors.store(true, Ordering::SeqCst);
                self.stopping.store(true, Ordering::SeqCst);
                self.tracker.wait_idle().await;
                for error in self.take_failures() {
                    tracing::debug!(handler_id = %self.id, %error, "Ignoring route handler error");
                }
                Ok(())
            }
        }
    }

    fn take_failures(&self) -> Vec<Error> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("pattern", self.pattern())
            .field("remaining", &self.remaining())
            .field("active", &self.active_invocations())
            .finish()
    }
}
