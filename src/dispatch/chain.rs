//! Handler chain state machine.
//!
//! Walks the candidates of one request and folds handler decisions into the
//! request. No I/O and no runtime: the dispatcher drives it.

use std::sync::Arc;

use crate::error::Result;
use crate::route::{AbortReason, Request, Response, RouteAction};
use crate::routing::handler::{Claim, Registration};
use crate::routing::router::RouteSnapshot;

/// Which table a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Page,
    Context,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Page => "page",
            ScopeKind::Context => "context",
        }
    }
}

/// A registration selected to handle the request next.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub registration: Arc<Registration>,
    pub scope: ScopeKind,
    /// The claim used up the registration's cap; it must leave its table.
    pub exhausted: bool,
}

/// What the dispatcher does after a decision.
#[derive(Debug)]
pub enum Step {
    /// Try the next candidate.
    Next,
    /// Send this request to the network.
    Network(Request),
    Fulfilled(Response),
    Aborted(AbortReason),
}

#[derive(Debug)]
struct Candidate {
    registration: Arc<Registration>,
    scope: ScopeKind,
}

/// Ordered candidates for one request plus the cumulative request.
#[derive(Debug)]
pub struct Chain {
    candidates: Vec<Candidate>,
    position: usize,
    request: Request,
}

impl Chain {
    /// Page registrations come first, then context registrations, each
    /// newest-first as the snapshots already are.
    pub fn new(request: Request, page: &RouteSnapshot, context: &RouteSnapshot) -> Self {
        let page = page.iter().map(|registration| Candidate {
            registration: Arc::clone(registration),
            scope: ScopeKind::Page,
        });
        let context = context.iter().map(|registration| Candidate {
            registration: Arc::clone(registration),
            scope: ScopeKind::Context,
        });

        Self {
            candidates: page.chain(context).collect(),
            position: 0,
            request,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn remaining(&self) -> usize {
        self.candidates.len() - self.position
    }

    /// Advance to the next registration that matches the current URL and
    /// still has invocations left, reserving one invocation on it.
    pub fn next_candidate(&mut self) -> Option<Invocation> {
        while let Some(candidate) = self.candidates.get(self.position) {
            self.position += 1;

            if !candidate.registration.matches(self.request.url()) {
                continue;
            }

            let exhausted = match candidate.registration.claim() {
                Claim::Exhausted => continue,
                Claim::Last => true,
                Claim::Granted => false,
            };

            return Some(Invocation {
                registration: Arc::clone(&candidate.registration),
                scope: candidate.scope,
                exhausted,
            });
        }
        None
    }

    /// Fold one handler decision into the chain.
    pub fn apply(&mut self, action: RouteAction) -> Result<Step> {
        match action {
            RouteAction::Fallback(overrides) => {
                self.request.apply_overrides(&overrides)?;
                Ok(Step::Next)
            }
            RouteAction::Continue(overrides) => {
                self.request.apply_overrides(&overrides)?;
                Ok(Step::Network(self.request.clone()))
            }
            RouteAction::Fulfill(response) => Ok(Step::Fulfilled(response)),
            RouteAction::Abort(reason) => Ok(Step::Aborted(reason)),
        }
    }
}
