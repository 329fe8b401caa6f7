use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get_service},
    Json, Router,
};
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::config::ProxyConfig;

/** \brief 转发时丢弃的请求头。 */
const STRIPPED_REQUEST_HEADERS: [&str; 3] = ["host", "origin", "referer"];

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const PREFLIGHT_MAX_AGE: &str = "86400";

/**
 * \brief 代理共享状态：上游地址与复用的 HTTP 客户端。
 */
#[derive(Debug, Clone)]
pub struct ProxyState {
    http: reqwest::Client,
    upstream: String,
}

impl ProxyState {
    pub fn new(upstream: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            upstream: upstream.into().trim_end_matches('/').to_string(),
        })
    }
}

/**
 * \brief 构建路由：/api 下任意方法转发到上游，其余路径走静态目录。
 */
pub fn router(state: ProxyState, static_dir: &str) -> Router {
    let static_service =
        get_service(ServeDir::new(static_dir).append_index_html_on_directories(true));

    Router::new()
        .route("/api", any(forward))
        .route("/api/", any(forward))
        .route("/api/{*path}", any(forward))
        .fallback_service(static_service)
        .with_state(Arc::new(state))
}

/**
 * \brief 启动边缘代理。
 * \param addr 监听地址，如 "127.0.0.1:5173"
 */
pub async fn run(addr: &str, config: &ProxyConfig) -> Result<()> {
    let state = ProxyState::new(config.upstream.clone())?;
    let app = router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, upstream = %config.upstream, "edge proxy listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 将 /api 前缀下的路径映射为上游路径。
 */
pub fn upstream_path(path: &str) -> &'static str {
    let rest = path.strip_prefix("/api").unwrap_or(path);
    if rest.starts_with("/graphql") {
        "/graphql"
    } else if rest.trim_end_matches('/') == "/health" {
        "/health"
    } else {
        "/"
    }
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,Authorization"),
    );
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn forwarded_request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in incoming {
        if STRIPPED_REQUEST_HEADERS.contains(&name.as_str())
            || is_hop_by_hop(name)
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors(resp.headers_mut());
        resp.headers_mut().insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        return resp;
    }

    let query = uri.query().map(|q| format!("?{}", q)).unwrap_or_default();
    let target = format!("{}{}{}", state.upstream, upstream_path(uri.path()), query);
    debug!(method = %method, path = %uri.path(), upstream_url = %target, "proxying request");

    let mut req = state
        .http
        .request(method.clone(), &target)
        .headers(forwarded_request_headers(&headers));
    if method != Method::GET && method != Method::HEAD {
        req = req.body(body);
    }

    let mut resp = match relay(req).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(upstream_url = %target, error = %e, "upstream request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "API request failed",
                    "message": e.to_string(),
                    "upstreamUrl": target,
                })),
            )
                .into_response()
        }
    };
    apply_cors(resp.headers_mut());
    resp
}

async fn relay(req: reqwest::RequestBuilder) -> Result<Response, reqwest::Error> {
    let upstream = req.send().await?;
    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) && *name != header::CONTENT_LENGTH {
            headers.append(name.clone(), value.clone());
        }
    }
    let body = upstream.bytes().await?;
    Ok((status, headers, body).into_response())
}
