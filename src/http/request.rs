//! Incoming request conversion.
//!
//! # Responsibilities
//! - Recover the target URL (absolute-form URI or Host header + path)
//! - Strip hop-by-hop headers before the request enters the route chain
//! - Recognise requests the server forwarded to itself
//!
//! # Design Decisions
//! - Bodies are buffered up to the configured limit; handlers see `post_data`
//! - Intercepted requests are `document` resources

use axum::extract::Request as HttpRequest;
use axum::http::{header, HeaderMap, HeaderName, Uri};
use url::Url;

use crate::error::{Error, Result};
use crate::route::{Request, ResourceType};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Set by `HttpNetwork::mark_forwarded` on every request sent upstream;
/// seeing it on an incoming request means the server is its own upstream.
pub const X_HOP: &str = "x-route-dispatch-hop";

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(named.iter()) {
        headers.remove(name);
    }
}

pub fn is_forwarded(headers: &HeaderMap) -> bool {
    headers.contains_key(X_HOP)
}

/// The URL the client asked for.
pub fn target_url(uri: &Uri, headers: &HeaderMap) -> Result<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string())
            .map_err(|e| Error::InvalidArgument(format!("invalid request target {uri}: {e}")));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::InvalidArgument("request has no absolute URI and no Host header".into()))?;
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    Url::parse(&format!("http://{host}{path}"))
        .map_err(|e| Error::InvalidArgument(format!("invalid request target {host}{path}: {e}")))
}

/// Convert an incoming HTTP request into a routable `Request`.
pub async fn into_route_request(request: HttpRequest, max_body_bytes: usize) -> Result<Request> {
    let (parts, body) = request.into_parts();
    let url = target_url(&parts.uri, &parts.headers)?;

    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| Error::InvalidArgument(format!("failed to read request body: {e}")))?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let mut request = Request::new(parts.method, url)
        .with_headers(headers)
        .with_resource_type(ResourceType::Document);
    if !body.is_empty() {
        request = request.with_post_data(body);
    }
    Ok(request)
}
