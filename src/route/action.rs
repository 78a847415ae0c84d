//! Handler decisions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::route::request::Overrides;
use crate::route::response::Response;

/// The single decision a handler invocation makes about its route.
#[derive(Debug, Clone)]
pub enum RouteAction {
    /// Send the request to the network, with cumulative plus these overrides.
    Continue(Overrides),
    /// Hand the request to the next matching handler.
    Fallback(Overrides),
    /// Answer with a synthetic response.
    Fulfill(Response),
    /// Fail the request with a network error.
    Abort(AbortReason),
}

impl RouteAction {
    pub fn name(&self) -> &'static str {
        match self {
            RouteAction::Continue(_) => "continue",
            RouteAction::Fallback(_) => "fallback",
            RouteAction::Fulfill(_) => "fulfill",
            RouteAction::Abort(_) => "abort",
        }
    }

    /// True when no later handler will see the route.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RouteAction::Fallback(_))
    }
}

/// Network error reported to the page for an aborted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortReason {
    Aborted,
    AccessDenied,
    AddressUnreachable,
    BlockedByClient,
    BlockedByResponse,
    ConnectionAborted,
    ConnectionClosed,
    ConnectionFailed,
    ConnectionRefused,
    ConnectionReset,
    InternetDisconnected,
    NameNotResolved,
    TimedOut,
    #[default]
    Failed,
}

impl AbortReason {
    pub const ALL: [AbortReason; 14] = [
        AbortReason::Aborted,
        AbortReason::AccessDenied,
        AbortReason::AddressUnreachable,
        AbortReason::BlockedByClient,
        AbortReason::BlockedByResponse,
        AbortReason::ConnectionAborted,
        AbortReason::ConnectionClosed,
        AbortReason::ConnectionFailed,
        AbortReason::ConnectionRefused,
        AbortReason::ConnectionReset,
        AbortReason::InternetDisconnected,
        AbortReason::NameNotResolved,
        AbortReason::TimedOut,
        AbortReason::Failed,
    ];

    /// Lowercase error code, as accepted by `FromStr`.
    pub fn code(&self) -> &'static str {
        match self {
            AbortReason::Aborted => "aborted",
            AbortReason::AccessDenied => "accessdenied",
            AbortReason::AddressUnreachable => "addressunreachable",
            AbortReason::BlockedByClient => "blockedbyclient",
            AbortReason::BlockedByResponse => "blockedbyresponse",
            AbortReason::ConnectionAborted => "connectionaborted",
            AbortReason::ConnectionClosed => "connectionclosed",
            AbortReason::ConnectionFailed => "connectionfailed",
            AbortReason::ConnectionRefused => "connectionrefused",
            AbortReason::ConnectionReset => "connectionreset",
            AbortReason::InternetDisconnected => "internetdisconnected",
            AbortReason::NameNotResolved => "namenotresolved",
            AbortReason::TimedOut => "timedout",
            AbortReason::Failed => "failed",
        }
    }

    /// Chromium-style net error name.
    pub fn net_error(&self) -> &'static str {
        match self {
            AbortReason::Aborted => "ERR_ABORTED",
            AbortReason::AccessDenied => "ERR_ACCESS_DENIED",
            AbortReason::AddressUnreachable => "ERR_ADDRESS_UNREACHABLE",
            AbortReason::BlockedByClient => "ERR_BLOCKED_BY_CLIENT",
            AbortReason::BlockedByResponse => "ERR_BLOCKED_BY_RESPONSE",
            AbortReason::ConnectionAborted => "ERR_CONNECTION_ABORTED",
            AbortReason::ConnectionClosed => "ERR_CONNECTION_CLOSED",
            AbortReason::ConnectionFailed => "ERR_CONNECTION_FAILED",
            AbortReason::ConnectionRefused => "ERR_CONNECTION_REFUSED",
            AbortReason::ConnectionReset => "ERR_CONNECTION_RESET",
            AbortReason::InternetDisconnected => "ERR_INTERNET_DISCONNECTED",
            AbortReason::NameNotResolved => "ERR_NAME_NOT_RESOLVED",
            AbortReason::TimedOut => "ERR_TIMED_OUT",
            AbortReason::Failed => "ERR_FAILED",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "net::{}", self.net_error())
    }
}

impl FromStr for AbortReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AbortReason::ALL
            .into_iter()
            .find(|reason| reason.code() == wanted)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown abort error code {s:?}")))
    }
}
