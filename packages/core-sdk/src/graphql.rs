use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::Transport;
use crate::error::{DispatchError, ErrorKind};
use crate::models::{ApiConfig, DispatchRequest, HealthStatus, Reply, TokenUsage};

pub const SEND_MESSAGE_MUTATION: &str = r#"
  mutation SendMessage($input: SendMessageInput!) {
    sendMessage(input: $input) {
      reply
      status
      timestamp
      usage {
        promptTokens
        completionTokens
        totalTokens
      }
      error
      errorType
    }
  }
"#;

pub const HEALTH_QUERY: &str = r#"
  query Health {
    health {
      status
      timestamp
      version
    }
  }
"#;

pub const API_CONFIG_QUERY: &str = r#"
  query APIConfig {
    apiConfig {
      version
      supportedModels
      maxTokens
      timestamp
    }
  }
"#;

#[derive(Debug, Serialize)]
struct GraphqlBody<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageData {
    send_message: Option<ChatResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum ResponseStatus {
    Success,
    Error,
}

/**
 * \brief sendMessage 变更的返回结构。
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    #[serde(default)]
    reply: Option<String>,
    status: ResponseStatus,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthData {
    health: HealthStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiConfigData {
    api_config: ApiConfig,
}

/**
 * \brief GraphQL 传输：单次 mutation/query 到配置的 /graphql 端点。
 */
#[derive(Debug, Clone)]
pub struct GraphqlTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphqlTransport {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /**
     * \brief 使用独立 HTTP 客户端构造，供只做查询的调用方使用。
     */
    pub fn connect(endpoint: impl Into<String>) -> Result<Self, DispatchError> {
        Ok(Self::new(reqwest::Client::builder().build()?, endpoint))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /**
     * \brief 健康检查查询。
     */
    pub async fn health(&self) -> Result<HealthStatus, DispatchError> {
        let (status, body) = self.post(HEALTH_QUERY, json!({})).await?;
        let data: HealthData = decode_data(status, &body)?;
        Ok(data.health)
    }

    /**
     * \brief 后端可用时返回 true；任何失败都视为不可用。
     */
    pub async fn check_health(&self) -> bool {
        match self.health().await {
            Ok(h) => h.status == "OK",
            Err(e) => {
                warn!(kind = %e.kind, error = %e, "health check failed");
                false
            }
        }
    }

    /**
     * \brief 获取后端 API 配置（支持的模型、最大 token 数）。
     */
    pub async fn api_config(&self) -> Result<ApiConfig, DispatchError> {
        let (status, body) = self.post(API_CONFIG_QUERY, json!({})).await?;
        let data: ApiConfigData = decode_data(status, &body)?;
        Ok(data.api_config)
    }

    async fn post(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<(u16, Vec<u8>), DispatchError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&GraphqlBody { query, variables })
            .send()
            .await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        Ok((status, bytes.to_vec()))
    }
}

#[async_trait]
impl Transport for GraphqlTransport {
    async fn send(&self, request: &DispatchRequest) -> Result<Reply, DispatchError> {
        let mut input = serde_json::to_value(&request.options)
            .map_err(|e| DispatchError::unknown(e.to_string()))?;
        input["message"] = json!(request.message);
        debug!(endpoint = %self.endpoint, "graphql dispatch");

        let (status, body) = self
            .post(SEND_MESSAGE_MUTATION, json!({ "input": input }))
            .await?;
        classify_send_message(status, &body)
    }
}

/**
 * \brief 将 sendMessage 响应归类为回复或错误。
 */
pub fn classify_send_message(status: u16, body: &[u8]) -> Result<Reply, DispatchError> {
    let data: SendMessageData = decode_data(status, body)?;
    let chat = data
        .send_message
        .ok_or_else(|| DispatchError::network("unrecognized response: missing sendMessage"))?;

    match chat.status {
        ResponseStatus::Error => Err(DispatchError::reported(
            chat.error_type.as_deref(),
            ErrorKind::GraphqlError,
            chat.error
                .unwrap_or_else(|| "GraphQL API returned an error".to_string()),
        )
        .with_status(status)),
        ResponseStatus::Success => match chat.reply {
            Some(reply) => Ok(Reply {
                reply,
                timestamp: chat.timestamp,
                usage: chat.usage,
            }),
            None => Err(DispatchError::network("unrecognized response: missing reply")),
        },
    }
}

/**
 * \brief 通用 GraphQL 解码：errors 数组优先，其次 HTTP 状态，最后 data。
 *
 * 先按 Value 解析，data 结构不符时 errors 数组也不会丢失。
 */
fn decode_data<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, DispatchError> {
    let success = (200..300).contains(&status);
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) if !success => return Err(DispatchError::http(status)),
        Err(e) => {
            return Err(
                DispatchError::network(format!("unrecognized response: {}", e))
                    .with_status(status),
            )
        }
    };

    if let Some(first) = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let message = first
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("GraphQL query failed");
        return Err(DispatchError::graphql(message).with_status(status));
    }

    let data = value.get("data").filter(|d| !d.is_null()).cloned();
    let decoded = data.map(serde_json::from_value::<T>);
    match decoded {
        Some(Ok(data)) => Ok(data),
        _ if !success => {
            let text = value.get("error").and_then(Value::as_str).map(str::to_string);
            Err(DispatchError::http_with_message(status, text))
        }
        Some(Err(e)) => Err(
            DispatchError::network(format!("unrecognized response: {}", e)).with_status(status),
        ),
        None => Err(
            DispatchError::network("unrecognized response: missing data").with_status(status),
        ),
    }
}
