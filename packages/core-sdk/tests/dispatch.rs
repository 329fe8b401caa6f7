/*!
 * \brief 端到端分发测试：进程内桩后端与边缘代理。
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chatlink_core_sdk::config::EndpointConfig;
use chatlink_core_sdk::graphql::GraphqlTransport;
use chatlink_core_sdk::proxy::{self, ProxyState};
use chatlink_core_sdk::{ChatClient, ErrorKind, TransportMode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Backend {
    rest_hits: Arc<AtomicUsize>,
    graphql_hits: Arc<AtomicUsize>,
}

async fn rest_handler(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.rest_hits.fetch_add(1, Ordering::SeqCst);
    match body["message"].as_str().unwrap_or_default() {
        "hello" => Json(json!({"reply": "hi there", "status": "success"})).into_response(),
        "x" => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "status": "error",
                "error": "balance too low",
                "errorType": "INSUFFICIENT_BALANCE"
            })),
        )
            .into_response(),
        "soft-fail" => Json(json!({"status": "error", "error": "model busy"})).into_response(),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "headers" => {
            let reply = format!(
                "origin={} referer={}",
                headers.contains_key("origin"),
                headers.contains_key("referer")
            );
            Json(json!({"reply": reply, "status": "success"})).into_response()
        }
        other => Json(json!({"reply": format!("echo: {}", other), "status": "success"}))
            .into_response(),
    }
}

async fn graphql_handler(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let query = body["query"].as_str().unwrap_or_default();
    if query.contains("query Health") {
        return Json(json!({
            "data": {"health": {"status": "OK", "timestamp": "2025-01-01T00:00:00Z", "version": "1.0.0"}}
        }))
        .into_response();
    }
    if query.contains("query APIConfig") {
        return Json(json!({
            "data": {"apiConfig": {
                "version": "1.0.0",
                "supportedModels": ["deepseek-chat", "deepseek-reasoner"],
                "maxTokens": 4096,
                "timestamp": "2025-01-01T00:00:00Z"
            }}
        }))
        .into_response();
    }

    backend.graphql_hits.fetch_add(1, Ordering::SeqCst);
    let input = &body["variables"]["input"];
    let payload = match input["message"].as_str().unwrap_or_default() {
        "hello" => json!({"data": {"sendMessage": {
            "reply": "hi there", "status": "SUCCESS", "timestamp": "2025-01-01T00:00:00Z",
            "usage": {"promptTokens": 1, "completionTokens": 2, "totalTokens": 3},
            "error": null, "errorType": null
        }}}),
        "x" => json!({"data": {"sendMessage": {
            "reply": "", "status": "ERROR", "timestamp": "2025-01-01T00:00:00Z",
            "error": "balance too low", "errorType": "INSUFFICIENT_BALANCE"
        }}}),
        "schema" => json!({
            "data": null,
            "errors": [{"message": "Cannot query field \"foo\""}, {"message": "ignored"}]
        }),
        "boom" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        "options" => json!({"data": {"sendMessage": {
            "reply": format!("model={} session={}", input["model"], input["sessionId"]),
            "status": "SUCCESS", "timestamp": "2025-01-01T00:00:00Z"
        }}}),
        other => json!({"data": {"sendMessage": {
            "reply": format!("echo: {}", other), "status": "SUCCESS",
            "timestamp": "2025-01-01T00:00:00Z"
        }}}),
    };
    Json(payload).into_response()
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "OK"}))
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn start_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/", post(rest_handler))
        .route("/graphql", post(graphql_handler))
        .route("/health", get(health_handler))
        .with_state(backend.clone());
    (spawn(app).await, backend)
}

fn client_for(base: &str) -> ChatClient {
    ChatClient::from_config(&EndpointConfig::from_base(base)).unwrap()
}

#[tokio::test]
async fn hello_round_trip_on_both_transports() {
    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    for mode in [TransportMode::Rest, TransportMode::Graphql] {
        assert_eq!(client.dispatch("hello", mode).await.unwrap(), "hi there");
    }
}

#[tokio::test]
async fn insufficient_balance_classifies_identically() {
    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    let rest = client.dispatch("x", TransportMode::Rest).await.unwrap_err();
    let gql = client.dispatch("x", TransportMode::Graphql).await.unwrap_err();

    assert_eq!(rest.kind, ErrorKind::InsufficientBalance);
    assert_eq!(rest.message, "balance too low");
    assert_eq!(rest.status, Some(402));
    assert_eq!(gql.kind, rest.kind);
    assert_eq!(gql.message, rest.message);
}

#[tokio::test]
async fn plain_500_is_http_error_on_both_transports() {
    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    for mode in [TransportMode::Rest, TransportMode::Graphql] {
        let err = client.dispatch("boom", mode).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HttpError, "mode {}", mode);
        assert_eq!(err.status, Some(500));
    }
}

#[tokio::test]
async fn untyped_backend_error_maps_to_transport_flavour() {
    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    let err = client
        .dispatch("soft-fail", TransportMode::Rest)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ApiError);
    assert_eq!(err.message, "model busy");
}

#[tokio::test]
async fn graphql_errors_array_promotes_first_entry() {
    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    let err = client
        .dispatch("schema", TransportMode::Graphql)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::GraphqlError);
    assert_eq!(err.message, "Cannot query field \"foo\"");
}

#[tokio::test]
async fn graphql_carries_options_and_usage() {
    use chatlink_core_sdk::models::{DispatchOptions, DispatchRequest};

    let (addr, _) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    let request = DispatchRequest::new("options").with_options(DispatchOptions {
        session_id: Some("s-42".into()),
        model: Some("deepseek-chat".into()),
        ..Default::default()
    });
    let reply = client
        .dispatch_request(&request, TransportMode::Graphql)
        .await
        .unwrap();
    assert_eq!(reply.reply, r#"model="deepseek-chat" session="s-42""#);

    let reply = client
        .dispatch_request(&DispatchRequest::new("hello"), TransportMode::Graphql)
        .await
        .unwrap();
    assert_eq!(reply.usage.map(|u| u.total_tokens), Some(3));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr));
    for mode in [TransportMode::Rest, TransportMode::Graphql] {
        let err = client.dispatch("hello", mode).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError, "mode {}", mode);
        assert_eq!(err.status, None);
    }
}

#[tokio::test]
async fn repeated_messages_hit_the_backend_each_time() {
    let (addr, backend) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    client.dispatch("hello", TransportMode::Rest).await.unwrap();
    client.dispatch("hello", TransportMode::Rest).await.unwrap();
    client.dispatch("hello", TransportMode::Graphql).await.unwrap();
    client.dispatch("hello", TransportMode::Graphql).await.unwrap();

    assert_eq!(backend.rest_hits.load(Ordering::SeqCst), 2);
    assert_eq!(backend.graphql_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_dispatches_do_not_interfere() {
    let (addr, backend) = start_backend().await;
    let client = client_for(&format!("http://{}", addr));

    let calls = (0..8).map(|i| {
        let client = client.clone();
        async move {
            let mode = if i % 2 == 0 {
                TransportMode::Rest
            } else {
                TransportMode::Graphql
            };
            (i, client.dispatch(&format!("m{}", i), mode).await)
        }
    });
    for (i, result) in futures_util::future::join_all(calls).await {
        assert_eq!(result.unwrap(), format!("echo: m{}", i));
    }
    assert_eq!(backend.rest_hits.load(Ordering::SeqCst), 4);
    assert_eq!(backend.graphql_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn health_and_api_config_queries() {
    let (addr, _) = start_backend().await;
    let gql = GraphqlTransport::new(reqwest::Client::new(), format!("http://{}/graphql", addr));

    let health = gql.health().await.unwrap();
    assert_eq!(health.version, "1.0.0");
    assert!(gql.check_health().await);

    let config = gql.api_config().await.unwrap();
    assert_eq!(config.max_tokens, 4096);
    assert_eq!(config.supported_models.len(), 2);
}

#[tokio::test]
async fn check_health_is_false_when_backend_is_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gql = GraphqlTransport::new(reqwest::Client::new(), format!("http://{}/graphql", addr));
    assert!(!gql.check_health().await);
}

async fn start_proxy(upstream: &str) -> SocketAddr {
    let state = ProxyState::new(upstream).unwrap();
    spawn(proxy::router(state, "does-not-exist")).await
}

#[tokio::test]
async fn dispatch_through_proxy_matches_direct_behaviour() {
    let (backend_addr, _) = start_backend().await;
    let proxy_addr = start_proxy(&format!("http://{}", backend_addr)).await;

    let client = ChatClient::from_config(&EndpointConfig::new(
        format!("http://{}/api", proxy_addr),
        format!("http://{}/api/graphql", proxy_addr),
    ))
    .unwrap();

    for mode in [TransportMode::Rest, TransportMode::Graphql] {
        assert_eq!(client.dispatch("hello", mode).await.unwrap(), "hi there");
        let err = client.dispatch("x", mode).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientBalance);
        assert_eq!(err.message, "balance too low");
    }
}

#[tokio::test]
async fn proxy_strips_identity_headers_and_adds_cors() {
    let (backend_addr, _) = start_backend().await;
    let proxy_addr = start_proxy(&format!("http://{}", backend_addr)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/chat", proxy_addr))
        .header("origin", "https://chat.example")
        .header("referer", "https://chat.example/")
        .json(&json!({"message": "headers"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reply"], "origin=false referer=false");
}

#[tokio::test]
async fn proxy_routes_health_and_answers_preflight() {
    let (backend_addr, _) = start_backend().await;
    let proxy_addr = start_proxy(&format!("http://{}", backend_addr)).await;
    let http = reqwest::Client::new();

    let health: Value = http
        .get(format!("http://{}/api/health", proxy_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "OK");

    let preflight = http
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/api/graphql", proxy_addr),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 204);
    let headers = preflight.headers();
    assert_eq!(headers["access-control-allow-methods"], "GET,POST,OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type,Authorization");
    assert_eq!(headers["access-control-max-age"], "86400");
}

#[tokio::test]
async fn proxy_reports_unreachable_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    let proxy_addr = start_proxy(&format!("http://{}", dead)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/api", proxy_addr))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "API request failed");
    assert!(body["upstreamUrl"].as_str().unwrap().ends_with('/'));

    let client = ChatClient::from_config(&EndpointConfig::new(
        format!("http://{}/api", proxy_addr),
        format!("http://{}/api/graphql", proxy_addr),
    ))
    .unwrap();
    let rest = client
        .dispatch("hello", TransportMode::Rest)
        .await
        .unwrap_err();
    assert_eq!(rest.kind, ErrorKind::HttpError);
    assert_eq!(rest.message, "API request failed");
    assert_eq!(rest.status, Some(500));
}

#[tokio::test]
async fn dead_upstream_classifies_identically_on_both_transports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    let proxy_addr = start_proxy(&format!("http://{}", dead)).await;

    let client = ChatClient::from_config(&EndpointConfig::new(
        format!("http://{}/api", proxy_addr),
        format!("http://{}/api/graphql", proxy_addr),
    ))
    .unwrap();

    let rest = client
        .dispatch("hello", TransportMode::Rest)
        .await
        .unwrap_err();
    let gql = client
        .dispatch("hello", TransportMode::Graphql)
        .await
        .unwrap_err();

    assert_eq!(rest.kind, ErrorKind::HttpError);
    assert_eq!(gql.kind, rest.kind);
    assert_eq!(gql.message, rest.message);
    assert_eq!(gql.status, rest.status);
    assert!(!rest.kind.is_backend_reported());
}
