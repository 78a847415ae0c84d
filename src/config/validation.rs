//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every rule pattern so bad globs fail at load, not at dispatch
//! - Validate value ranges (timeouts > 0, status codes, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use url::Url;

use crate::config::schema::{DispatchConfig, RouteRuleConfig, RuleAction};
use crate::route::request::parse_header;
use crate::routing::rules::rule_pattern;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }

    for (field, value) in [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("timeouts.fetch_ms", config.timeouts.fetch_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.network.max_body_bytes == 0 {
        errors.push(ValidationError::new("network.max_body_bytes", "must be greater than zero"));
    }

    let base_url = match config.context.base_url.as_deref().map(Url::parse) {
        Some(Ok(url)) => Some(url),
        Some(Err(e)) => {
            errors.push(ValidationError::new("context.base_url", e.to_string()));
            None
        }
        None => None,
    };

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    for (index, rule) in config.rules.iter().enumerate() {
        validate_rule(index, rule, base_url.as_ref(), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_rule(
    index: usize,
    rule: &RouteRuleConfig,
    base_url: Option<&Url>,
    errors: &mut Vec<ValidationError>,
) {
    let field = |name: &str| format!("rules[{index}].{name}");

    if let Err(e) = rule_pattern(rule).compile(base_url) {
        errors.push(ValidationError::new(field("pattern"), e.to_string()));
    }

    if rule.times == Some(0) {
        errors.push(ValidationError::new(field("times"), "must be at least 1"));
    }

    if let Some(status) = rule.status {
        if StatusCode::from_u16(status).is_err() {
            errors.push(ValidationError::new(field("status"), format!("{status} is not a status code")));
        }
        if rule.action != RuleAction::Fulfill {
            errors.push(ValidationError::new(field("status"), "only valid for fulfill rules"));
        }
    }

    for (name, value) in &rule.headers {
        if let Err(e) = parse_header(name, value) {
            errors.push(ValidationError::new(field("headers"), e.to_string()));
        }
    }

    if rule.reason.is_some() && rule.action != RuleAction::Abort {
        errors.push(ValidationError::new(field("reason"), "only valid for abort rules"));
    }

    let overrides_request = rule.url.is_some() || rule.method.is_some();
    if overrides_request && !matches!(rule.action, RuleAction::Continue | RuleAction::Fallback) {
        errors.push(ValidationError::new(
            field("action"),
            "url and method overrides need a continue or fallback rule",
        ));
    }

    if let Some(method) = &rule.method {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(field("method"), format!("{method:?} is not an HTTP method")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> DispatchConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&DispatchConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let config = parse(
            r#"
            [listener]
            bind_address = "not an address"

            [timeouts]
            fetch_ms = 0

            [[rules]]
            pattern = "**/{a,{b}}"
            action = "fulfill"
            status = 1000
            "#,
        );

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.fetch_ms",
                "rules[0].pattern",
                "rules[0].status",
            ]
        );
    }

    #[test]
    fn rejects_options_that_do_not_fit_the_action() {
        let config = parse(
            r#"
            [[rules]]
            pattern = "**/*"
            action = "fulfill"
            reason = "aborted"
            url = "/other"
            "#,
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "rules[0].reason: only valid for abort rules");
    }

    #[test]
    fn rejects_bad_base_url() {
        let config = parse(
            r#"
            [context]
            base_url = "::nope"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "context.base_url");
    }
}
