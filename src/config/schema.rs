//! Configuration schema definitions.
//!
//! This module defines the configuration of the intercept server and its
//! route rules. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::route::AbortReason;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Listener configuration for the intercept server.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream network settings.
    pub network: NetworkConfig,

    /// Browser-context level settings shared by every page.
    pub context: ContextConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Declarative routes, installed on the context in file order.
    pub rules: Vec<RouteRuleConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Timeout configuration for the various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline, handlers included, in milliseconds.
    pub request_ms: u64,

    /// Default deadline of `Route::fetch` in milliseconds.
    pub fetch_ms: u64,

    /// Upstream connection establishment timeout in milliseconds.
    pub connect_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn fetch(&self) -> Duration {
        Duration::from_millis(self.fetch_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            fetch_ms: 30_000,
            connect_ms: 5_000,
        }
    }
}

/// Upstream network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Largest upstream body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Context configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContextConfig {
    /// Base URL relative patterns and navigations resolve against.
    pub base_url: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// How a rule's `pattern` string is interpreted.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Glob,
    Regex,
    Exact,
}

/// What a rule does with a matching request.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Fulfill,
    Abort,
    Continue,
    Fallback,
}

/// A declarative route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRuleConfig {
    /// Rule identifier for logging.
    #[serde(default)]
    pub name: Option<String>,

    pub pattern: String,

    #[serde(default)]
    pub kind: PatternKind,

    pub action: RuleAction,

    /// Fulfill: status code (default 200).
    #[serde(default)]
    pub status: Option<u16>,

    /// Fulfill: response headers. Continue/fallback: replacement request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Fulfill: response body. Continue/fallback: replacement post data.
    #[serde(default)]
    pub body: Option<String>,

    /// Fulfill: content type.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Abort: error code (default `failed`).
    #[serde(default)]
    pub reason: Option<AbortReason>,

    /// Invoke the rule at most this many times.
    #[serde(default)]
    pub times: Option<usize>,

    /// Continue/fallback: URL override.
    #[serde(default)]
    pub url: Option<String>,

    /// Continue/fallback: method override.
    #[serde(default)]
    pub method: Option<String>,
}

impl RouteRuleConfig {
    /// Name used in logs: the configured one or the pattern.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.pattern)
    }
}
