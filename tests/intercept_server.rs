//! End-to-end tests through the intercept server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use route_dispatch::config::parse_config;
use route_dispatch::http::X_HOP;
use route_dispatch::routing::install_rules;
use route_dispatch::{
    handler_fn, Context, ContextOptions, DispatchConfig, HttpNetwork, InterceptServer, Route,
    Shutdown,
};

mod common;
use common::start_echo_backend;

const RULES: &str = r#"
[[rules]]
name = "mocked-api"
pattern = "**/api/*"
action = "fulfill"
status = 201
body = '{"mocked":true}'
content_type = "application/json"

[[rules]]
pattern = "**/*.png"
action = "abort"
reason = "blockedbyclient"

[[rules]]
pattern = "**/legacy/*"
action = "continue"
url = "/modern/page"
"#;

struct Harness {
    addr: SocketAddr,
    context: Context,
    shutdown: Shutdown,
}

impl Harness {
    async fn start(config: DispatchConfig) -> Self {
        let network = HttpNetwork::new(&config.network, &config.timeouts).mark_forwarded();
        let context = Context::new(
            Arc::new(network),
            ContextOptions::from_config(&config).unwrap(),
        );
        install_rules(&context, &config.rules).unwrap();
        let page = context.new_page().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = InterceptServer::new(page, &config);
        let signal = shutdown.clone();
        tokio::spawn(async move { server.run(listener, signal).await });

        Self {
            addr,
            context,
            shutdown,
        }
    }

    /// Client that sends absolute-form requests through the server.
    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(format!("http://{}", self.addr)).unwrap())
            .build()
            .unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.context.close();
    }
}

#[tokio::test]
async fn test_unmatched_request_passes_through() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(parse_config(RULES).unwrap()).await;

    let response = harness
        .client()
        .get(format!("http://{backend}/index.html"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "GET /index.html");
}

#[tokio::test]
async fn test_fulfill_rule_answers_without_upstream() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(parse_config(RULES).unwrap()).await;

    let response = harness
        .client()
        .get(format!("http://{backend}/api/users"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["mocked"], true);
}

#[tokio::test]
async fn test_abort_rule_maps_to_bad_gateway() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(parse_config(RULES).unwrap()).await;

    let response = harness
        .client()
        .get(format!("http://{backend}/logo.png"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "net::ERR_BLOCKED_BY_CLIENT");
}

#[tokio::test]
async fn test_continue_rule_rewrites_url() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(parse_config(RULES).unwrap()).await;

    let response = harness
        .client()
        .post(format!("http://{backend}/legacy/page"))
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "POST /modern/page");
}

#[tokio::test]
async fn test_page_routes_run_before_rules() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(parse_config(RULES).unwrap()).await;

    let page = harness.context.pages().pop().unwrap();
    page.route(
        "**/api/*",
        handler_fn(|route: Route| async move { route.continue_(None).await }),
    )
    .unwrap();

    let response = harness
        .client()
        .get(format!("http://{backend}/api/users"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "GET /api/users");
}

#[tokio::test]
async fn test_request_to_server_itself_is_loop_detected() {
    let harness = Harness::start(DispatchConfig::default()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/self", harness.addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 508);
}

#[tokio::test]
async fn test_header_override_keeps_loop_detection() {
    let mut config = parse_config(
        r#"
[[rules]]
pattern = "**/self"
action = "continue"
headers = { "x-a" = "1" }
"#,
    )
    .unwrap();
    config.timeouts.request_ms = 5_000;
    let harness = Harness::start(config).await;

    let started = Instant::now();
    let response = reqwest::Client::new()
        .get(format!("http://{}/self", harness.addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 508);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_handlers_never_see_hop_marker() {
    let backend = start_echo_backend().await;
    let harness = Harness::start(DispatchConfig::default()).await;
    let seen: Arc<Mutex<Vec<bool>>> = Arc::default();

    let captured = seen.clone();
    harness
        .context
        .route(
            "**/*",
            handler_fn(move |route: Route| {
                let captured = captured.clone();
                async move {
                    captured
                        .lock()
                        .unwrap()
                        .push(route.request().headers().contains_key(X_HOP));
                    route.continue_(None).await
                }
            }),
        )
        .unwrap();

    let response = harness
        .client()
        .get(format!("http://{backend}/plain"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(seen.lock().unwrap().clone(), vec![false]);
}

#[tokio::test]
async fn test_request_timeout_maps_to_gateway_timeout() {
    let backend = start_echo_backend().await;
    let mut config = DispatchConfig::default();
    config.timeouts.request_ms = 200;
    let harness = Harness::start(config).await;

    harness
        .context
        .route(
            "**/hang",
            handler_fn(|route: Route| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                route.fallback(None).await
            }),
        )
        .unwrap();

    let response = harness
        .client()
        .get(format!("http://{backend}/hang"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    assert!(response.text().await.unwrap().contains("200ms"));
}

#[tokio::test]
async fn test_stalled_request_body_maps_to_gateway_timeout() {
    let mut config = DispatchConfig::default();
    config.timeouts.request_ms = 100;
    let harness = Harness::start(config).await;

    // Promise a body that never arrives.
    let mut stream = TcpStream::connect(harness.addr).await.unwrap();
    stream
        .write_all(
            format!(
                "POST /upload HTTP/1.1\r\nHost: {}\r\nContent-Length: 64\r\n\r\npartial",
                harness.addr
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let mut head = [0u8; 12];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut head))
        .await
        .expect("server should give up on the stalled body")
        .unwrap();
    assert_eq!(&head, b"HTTP/1.1 504");
}
