//! Intercept server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with a catch-all handler
//! - Wire up middleware (tracing, timeout)
//! - Convert each incoming request and dispatch it through the server page
//! - Stop accepting on the shutdown signal and drain in-flight requests

use std::time::Duration;

use axum::extract::{Request as HttpRequest, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response as HttpResponse;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::http::request::{into_route_request, is_forwarded, X_REQUEST_ID};
use crate::http::response::{error_response, into_http_response, loop_detected};
use crate::lifecycle::Shutdown;
use crate::scope::Page;

/// Slack on top of the page deadline so the page reports the timeout (504)
/// before the tower layer cuts the request off.
const TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Application state injected into the handler.
#[derive(Clone)]
pub struct InterceptState {
    pub page: Page,
    pub max_body_bytes: usize,
}

/// HTTP front end that routes every request through a page.
pub struct InterceptServer {
    router: Router,
}

impl InterceptServer {
    pub fn new(page: Page, config: &DispatchConfig) -> Self {
        let state = InterceptState {
            page,
            max_body_bytes: config.network.max_body_bytes,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &DispatchConfig, state: InterceptState) -> Router {
        Router::new()
            .fallback(intercept_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        config.timeouts.request() + TIMEOUT_SLACK,
                    )),
            )
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Intercept server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("Intercept server stopped");
        Ok(())
    }
}

async fn intercept_handler(State(state): State<InterceptState>, request: HttpRequest) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut response = if is_forwarded(request.headers()) {
        tracing::warn!(%request_id, %method, %uri, "Routing loop detected");
        loop_detected()
    } else {
        let result = match into_route_request(request, state.max_body_bytes).await {
            Ok(request) => {
                tracing::debug!(%request_id, %method, url = %request.url(), "Intercepting request");
                state.page.request(request).await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(response) => into_http_response(response),
            Err(error) => {
                tracing::debug!(%request_id, %method, %uri, %error, "Intercepted request failed");
                error_response(&error)
            }
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
