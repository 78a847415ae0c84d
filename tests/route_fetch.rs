//! Route fetch and continue against a live upstream.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};

use route_dispatch::config::{NetworkConfig, TimeoutConfig};
use route_dispatch::{
    handler_fn, Context, ContextOptions, Error, FetchOptions, FulfillResponse, HttpNetwork,
    Overrides, Route,
};

mod common;
use common::{start_echo_backend, start_programmable_backend, BackendRequest};

fn live_context() -> Context {
    let network = HttpNetwork::new(&NetworkConfig::default(), &TimeoutConfig::default());
    Context::new(Arc::new(network), ContextOptions::default())
}

#[tokio::test]
async fn test_fetch_timeout_is_independent_of_request_timeout() {
    let backend = start_programmable_backend(|request: BackendRequest| async move {
        if request.path == "/slow" {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        (200, "late".to_string())
    })
    .await;

    let context = live_context();
    let page = context.new_page().unwrap();
    let fetch_error: Arc<Mutex<Option<(Error, Duration)>>> = Arc::default();

    let captured = fetch_error.clone();
    page.route(
        "**/slow",
        handler_fn(move |route: Route| {
            let captured = captured.clone();
            async move {
                let started = Instant::now();
                let result = route
                    .fetch(Some(FetchOptions::new().timeout(Duration::from_millis(1000))))
                    .await;
                if let Err(error) = result {
                    *captured.lock().unwrap() = Some((error, started.elapsed()));
                }
                route
                    .fulfill(FulfillResponse::new().status(504).body("gave up"))
                    .await
            }
        }),
    )
    .unwrap();

    let response = page
        .goto(&format!("http://{backend}/slow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let (error, elapsed) = fetch_error.lock().unwrap().clone().unwrap();
    assert!(matches!(error, Error::Timeout { timeout_ms: 1000, .. }));
    assert!(error.to_string().contains("1000ms"), "{error}");
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test]
async fn test_fetch_then_fulfill_with_patched_response() {
    let backend = start_programmable_backend(|request: BackendRequest| async move {
        (200, format!("upstream {}", request.path))
    })
    .await;

    let context = live_context();
    let page = context.new_page().unwrap();

    page.route(
        "**/data",
        handler_fn(|route: Route| async move {
            let upstream = route.fetch(None).await?;
            let body = format!("{} (patched)", upstream.text());
            route
                .fulfill(
                    FulfillResponse::new()
                        .response(upstream)
                        .header("x-patched", "1")?
                        .body(body),
                )
                .await
        }),
    )
    .unwrap();

    let response = page.fetch(&format!("http://{backend}/data")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "upstream /data (patched)");
    assert_eq!(response.header_value("x-patched"), Some("1"));
    assert!(response.is_fulfilled());
}

#[tokio::test]
async fn test_fetch_applies_its_own_overrides() {
    let backend = start_echo_backend().await;
    let context = live_context();
    let page = context.new_page().unwrap();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();

    let captured = seen.clone();
    page.route(
        "**/original",
        handler_fn(move |route: Route| {
            let captured = captured.clone();
            async move {
                let fetched = route
                    .fetch(Some(FetchOptions::new().url("/other").method(Method::DELETE)))
                    .await?;
                captured.lock().unwrap().push(fetched.text());
                captured.lock().unwrap().push(route.request().url().path().to_string());
                route.continue_(None).await
            }
        }),
    )
    .unwrap();

    let response = page
        .fetch(&format!("http://{backend}/original"))
        .await
        .unwrap();

    assert_eq!(response.text(), "GET /original");
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec!["DELETE /other".to_string(), "/original".to_string()]
    );
}

#[tokio::test]
async fn test_continue_with_overrides_reaches_upstream() {
    let received: Arc<Mutex<Option<BackendRequest>>> = Arc::default();
    let captured = received.clone();
    let backend = start_programmable_backend(move |request: BackendRequest| {
        let captured = captured.clone();
        async move {
            *captured.lock().unwrap() = Some(request);
            (201, "stored".to_string())
        }
    })
    .await;

    let context = live_context();
    let page = context.new_page().unwrap();

    context
        .route(
            "**/submit",
            handler_fn(|route: Route| async move {
                let mut headers = route.request().headers().clone();
                headers.insert("foo", "bar".parse().unwrap());
                route
                    .fallback(Some(
                        Overrides::new()
                            .method(Method::POST)
                            .headers(headers)
                            .post_data("name=value"),
                    ))
                    .await
            }),
        )
        .unwrap();

    let response = page.goto(&format!("http://{backend}/submit")).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.text(), "stored");
    assert!(!response.is_fulfilled());

    let request = received.lock().unwrap().clone().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/submit");
    assert_eq!(request.header("foo"), Some("bar"));
    assert_eq!(request.body, "name=value");
}

#[tokio::test]
async fn test_unreachable_upstream_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let context = live_context();
    let page = context.new_page().unwrap();

    let err = page.goto(&format!("http://{addr}/")).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err}");
}
