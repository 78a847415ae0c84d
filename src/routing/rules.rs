//! Declarative routes from configuration.
//!
//! # Responsibilities
//! - Turn `[[rules]]` entries into context-level route handlers
//! - Swap the whole rule set on config reload
//!
//! # Design Decisions
//! - Handlers are built (headers parsed, methods checked) before anything is
//!   registered, so a bad rule never leaves the context half-configured
//! - Rules are registered in file order, so the last rule is tried first

use std::str::FromStr;

use axum::http::{HeaderMap, Method};

use crate::config::schema::{PatternKind, RouteRuleConfig, RuleAction};
use crate::error::{Error, Result};
use crate::route::request::parse_header;
use crate::route::{FulfillResponse, Overrides, Route};
use crate::routing::handler::{handler_fn, HandlerId, RouteHandler, RouteOptions, UnrouteBehavior};
use crate::routing::matcher::UrlPattern;
use crate::scope::Context;

/// The pattern a rule registers under.
pub fn rule_pattern(rule: &RouteRuleConfig) -> UrlPattern {
    match rule.kind {
        PatternKind::Glob => UrlPattern::glob(rule.pattern.as_str()),
        PatternKind::Regex => UrlPattern::regex(rule.pattern.as_str()),
        PatternKind::Exact => UrlPattern::exact(rule.pattern.as_str()),
    }
}

fn rule_headers(rule: &RouteRuleConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &rule.headers {
        let (name, value) = parse_header(name, value)?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn rule_overrides(rule: &RouteRuleConfig) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    if let Some(url) = &rule.url {
        overrides = overrides.url(url.as_str());
    }
    if let Some(method) = &rule.method {
        let method = Method::from_str(method)
            .map_err(|e| Error::InvalidArgument(format!("method {method:?}: {e}")))?;
        overrides = overrides.method(method);
    }
    if !rule.headers.is_empty() {
        overrides = overrides.headers(rule_headers(rule)?);
    }
    if let Some(body) = &rule.body {
        overrides = overrides.post_data(body.clone());
    }
    Ok(overrides)
}

fn rule_fulfillment(rule: &RouteRuleConfig) -> Result<FulfillResponse> {
    let mut response = FulfillResponse::new().status(rule.status.unwrap_or(200));
    if !rule.headers.is_empty() {
        response = response.headers(rule_headers(rule)?);
    }
    if let Some(body) = &rule.body {
        response = response.body(body.clone());
    }
    if let Some(content_type) = &rule.content_type {
        response = response.content_type(content_type.as_str());
    }
    Ok(response)
}

/// Build the handler that performs a rule's action.
pub fn rule_handler(rule: &RouteRuleConfig) -> Result<RouteHandler> {
    let handler = match rule.action {
        RuleAction::Fulfill => {
            let response = rule_fulfillment(rule)?;
            handler_fn(move |route: Route| {
                let response = response.clone();
                async move { route.fulfill(response).await }
            })
        }
        RuleAction::Abort => {
            let reason = rule.reason.unwrap_or_default();
            handler_fn(move |route: Route| async move { route.abort(Some(reason)).await })
        }
        RuleAction::Continue => {
            let overrides = rule_overrides(rule)?;
            handler_fn(move |route: Route| {
                let overrides = overrides.clone();
                async move { route.continue_(Some(overrides)).await }
            })
        }
        RuleAction::Fallback => {
            let overrides = rule_overrides(rule)?;
            handler_fn(move |route: Route| {
                let overrides = overrides.clone();
                async move { route.fallback(Some(overrides)).await }
            })
        }
    };
    Ok(handler)
}

/// Register every rule on `context`, first rule first.
pub fn install_rules(context: &Context, rules: &[RouteRuleConfig]) -> Result<Vec<HandlerId>> {
    let prepared = rules
        .iter()
        .map(|rule| Ok((rule, rule_handler(rule)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut ids = Vec::with_capacity(prepared.len());
    for (rule, handler) in prepared {
        let options = RouteOptions { times: rule.times };
        let id = context.route_with_options(rule_pattern(rule), handler, options)?;
        tracing::info!(
            rule = rule.label(),
            handler_id = %id,
            action = ?rule.action,
            "Route rule installed"
        );
        ids.push(id);
    }
    Ok(ids)
}

/// Replace the context's routes with `rules`, waiting for running handlers.
pub async fn reload_rules(context: &Context, rules: &[RouteRuleConfig]) -> Result<Vec<HandlerId>> {
    for rule in rules {
        rule_handler(rule)?;
    }

    if let Err(error) = context.unroute_all(UnrouteBehavior::Wait).await {
        tracing::warn!(%error, "Route handler failed while rules were reloading");
    }
    install_rules(context, rules)
}
