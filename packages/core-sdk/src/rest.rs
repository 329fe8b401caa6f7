use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Transport;
use crate::error::{DispatchError, ErrorKind};
use crate::models::{DispatchRequest, Reply};

/**
 * \brief REST 请求体：{ message, userId?, sessionId? }。
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/**
 * \brief 成功与失败共用的响应信封，字段全部可选以便分类。
 */
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    reply: Option<String>,
    status: Option<String>,
    timestamp: Option<String>,
    error: Option<String>,
    error_type: Option<String>,
}

impl Envelope {
    fn is_error(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("error"))
            .unwrap_or(false)
    }

    /**
     * \brief 非 2xx 响应体只有带 errorType 或 status=error 时才算类型化错误。
     */
    fn is_typed_error(&self) -> bool {
        self.is_error() || self.error_type.is_some()
    }

    fn into_error(self, default_message: String) -> DispatchError {
        DispatchError::reported(
            self.error_type.as_deref(),
            ErrorKind::ApiError,
            self.error.unwrap_or(default_message),
        )
    }
}

/**
 * \brief REST 传输：单次 POST 到配置的端点。
 */
#[derive(Debug, Clone)]
pub struct RestTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl RestTransport {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn send(&self, request: &DispatchRequest) -> Result<Reply, DispatchError> {
        let body = SendMessageBody {
            message: &request.message,
            user_id: request.options.user_id.as_deref(),
            session_id: request.options.session_id.as_deref(),
        };
        debug!(endpoint = %self.endpoint, "rest dispatch");

        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        classify_response(status, &bytes)
    }
}

/**
 * \brief 将 REST 响应（状态码 + 原始响应体）归类为回复或错误。
 */
pub fn classify_response(status: u16, body: &[u8]) -> Result<Reply, DispatchError> {
    let envelope = serde_json::from_slice::<Envelope>(body).ok();
    let failed_msg = format!("request failed with status {}", status);

    if !(200..300).contains(&status) {
        return Err(match envelope {
            Some(env) if env.is_typed_error() => env.into_error(failed_msg).with_status(status),
            Some(env) => DispatchError::http_with_message(status, env.error),
            None => DispatchError::http(status),
        });
    }

    let envelope = envelope
        .ok_or_else(|| DispatchError::network("unrecognized response").with_status(status))?;
    if envelope.is_error() {
        return Err(envelope
            .into_error("server returned an error".to_string())
            .with_status(status));
    }
    match envelope.reply {
        Some(reply) => Ok(Reply {
            reply,
            timestamp: envelope.timestamp,
            usage: None,
        }),
        None => Err(DispatchError::network("unrecognized response: missing reply")
            .with_status(status)),
    }
}
