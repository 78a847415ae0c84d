//! Request representation and override application.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of resource the page asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    #[default]
    Fetch,
    Xhr,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Websocket,
    Other,
}

/// A request issued by a page, as seen by route handlers.
///
/// Handlers observe the cumulative request: every override applied by a
/// previous `fallback` in the chain is already folded in.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    url: Url,
    method: Method,
    headers: HeaderMap,
    post_data: Option<Bytes>,
    resource_type: ResourceType,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method,
            headers: HeaderMap::new(),
            post_data: None,
            resource_type: ResourceType::default(),
        }
    }

    /// Parse `url` and build a GET request.
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("invalid url {url:?}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_post_data(mut self, body: impl Into<Bytes>) -> Self {
        self.post_data = Some(body.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid UTF-8.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn post_data(&self) -> Option<&Bytes> {
        self.post_data.as_ref()
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Fold `overrides` into this request.
    ///
    /// A URL override is resolved relative to the current URL and must keep
    /// its scheme.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(raw) = &overrides.url {
            let next = self
                .url
                .join(raw)
                .map_err(|e| Error::InvalidArgument(format!("invalid url override {raw:?}: {e}")))?;
            if next.scheme() != self.url.scheme() {
                return Err(Error::InvalidArgument(format!(
                    "new URL must have same protocol as overridden URL ({} != {})",
                    next.scheme(),
                    self.url.scheme()
                )));
            }
            self.url = next;
        }
        if let Some(method) = &overrides.method {
            self.method = method.clone();
        }
        if let Some(headers) = &overrides.headers {
            self.headers = headers.clone();
        }
        if let Some(body) = &overrides.post_data {
            self.post_data = Some(body.clone());
        }
        Ok(())
    }
}

/// Fields a handler may replace when continuing or falling back.
///
/// `headers` replaces the whole header map.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub headers: Option<HeaderMap>,
    pub post_data: Option<Bytes>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn post_data(mut self, body: impl Into<Bytes>) -> Self {
        self.post_data = Some(body.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.headers.is_none()
            && self.post_data.is_none()
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidArgument(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("invalid header value for {name}: {e}")))?;
    Ok((name, value))
}
