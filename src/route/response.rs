//! Responses returned to pages, and the builder handlers use to fulfill.

use std::path::{Path, PathBuf};

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::route::request::parse_header;

/// A response as seen by the page: either from the network or fulfilled by
/// a handler.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    fulfilled: bool,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            fulfilled: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// True when a route handler produced this response.
    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled
    }
}

/// Builder for `Route::fulfill`.
///
/// Unset fields fall back to `response` (when given) and then to
/// `200`, no headers, empty body.
#[derive(Debug, Clone, Default)]
pub struct FulfillResponse {
    pub status: Option<u16>,
    pub headers: Option<HeaderMap>,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub path: Option<PathBuf>,
    pub response: Option<Response>,
}

impl FulfillResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.get_or_insert_with(HeaderMap::new).insert(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Base the fulfillment on a response obtained from `Route::fetch`.
    pub fn response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// JSON body with a matching content type.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidArgument(format!("failed to serialize json body: {e}")))?;
        Ok(Self::new().body(body).content_type("application/json"))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(status) = self.status {
            StatusCode::from_u16(status)
                .map_err(|_| Error::InvalidArgument(format!("invalid status code {status}")))?;
        }
        Ok(())
    }

    /// Materialize the final response for `url`, reading `path` if set.
    pub(crate) async fn build(self, url: &Url) -> Result<Response> {
        self.validate()?;

        let (base_status, base_headers, base_body) = match self.response {
            Some(base) => (Some(base.status), Some(base.headers), Some(base.body)),
            None => (None, None, None),
        };

        let status = match self.status {
            Some(code) => StatusCode::from_u16(code)
                .map_err(|_| Error::InvalidArgument(format!("invalid status code {code}")))?,
            None => base_status.unwrap_or(StatusCode::OK),
        };
        let mut headers = self.headers.or(base_headers).unwrap_or_default();

        let mut content_type = self.content_type;
        let body = match &self.path {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    Error::InvalidArgument(format!("failed to read {}: {e}", path.display()))
                })?;
                if content_type.is_none() {
                    content_type = guess_content_type(path).map(str::to_string);
                }
                Bytes::from(bytes)
            }
            None => self.body.or(base_body).unwrap_or_default(),
        };

        if let Some(content_type) = content_type {
            let value = HeaderValue::from_str(&content_type).map_err(|e| {
                Error::InvalidArgument(format!("invalid content type {content_type:?}: {e}"))
            })?;
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.remove(header::TRANSFER_ENCODING);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok(Response {
            url: url.clone(),
            status,
            headers,
            body,
            fulfilled: true,
        })
    }
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "wasm" => "application/wasm",
        _ => return None,
    })
}
