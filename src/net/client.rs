//! HTTP/1.1 network collaborator.
//!
//! # Responsibilities
//! - Send the final (possibly overridden) request upstream
//! - Buffer the upstream body up to a configured limit
//! - Map transport failures into `Error::Network`
//! - Optionally tag outbound requests with the intercept server's hop marker

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request as HttpRequest};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{NetworkConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::http::X_HOP;
use crate::net::Network;
use crate::route::{Request, Response};

/// Network backed by a pooled hyper client.
#[derive(Clone, Debug)]
pub struct HttpNetwork {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
    mark_forwarded: bool,
}

impl HttpNetwork {
    pub fn new(network: &NetworkConfig, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeouts.connect_ms)));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            max_body_bytes: network.max_body_bytes,
            mark_forwarded: false,
        }
    }

    /// Tag every outbound request with `X_HOP` so an intercept server that
    /// ends up as its own upstream answers 508 instead of looping.
    ///
    /// The marker is added on the wire only; handlers never see it, so header
    /// overrides cannot drop it.
    pub fn mark_forwarded(mut self) -> Self {
        self.mark_forwarded = true;
        self
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(Error::Network(format!(
                "unsupported scheme {:?} for {}",
                url.scheme(),
                url
            )));
        }

        let mut builder = HttpRequest::builder()
            .method(request.method().clone())
            .uri(url.as_str());

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers() {
                // Host and length are derived from the final url and body.
                if *name == header::HOST || *name == header::CONTENT_LENGTH {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
            if self.mark_forwarded {
                headers.insert(HeaderName::from_static(X_HOP), HeaderValue::from_static("1"));
            }
        }

        let body = match request.post_data() {
            Some(bytes) => Body::from(bytes.clone()),
            None => Body::empty(),
        };
        let upstream = builder
            .body(body)
            .map_err(|e| Error::Network(format!("failed to build request for {url}: {e}")))?;

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            url = %url,
            "Sending request upstream"
        );

        let response: hyper::Response<Incoming> = self.client.request(upstream).await.map_err(|e| {
            tracing::warn!(request_id = %request.id(), url = %url, error = %e, "Upstream error");
            Error::Network(e.to_string())
        })?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| Error::Network(format!("failed to read body from {url}: {e}")))?;

        Ok(Response::new(url.clone(), parts.status, parts.headers, body))
    }
}
