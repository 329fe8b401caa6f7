use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/**
 * \brief 会话角色。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/**
 * \brief 单条会话消息，创建后不可变。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /** \brief 会话内单调递增的 ID */
    pub id: u64,
    /** \brief 内容，可能包含 Markdown */
    pub content: String,
    pub role: Role,
    /** \brief 创建时间 */
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/**
 * \brief 发送时可选附带的会话/用户/模型提示。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/**
 * \brief 一次出站调用。message 应已去除首尾空白且非空，由调用方保证。
 */
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub message: String,
    pub options: DispatchOptions,
}

impl DispatchRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }
}

/**
 * \brief 成功调用的完整结果。reply 原样保留，不做任何改写。
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub reply: String,
    pub timestamp: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl Reply {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            timestamp: None,
            usage: None,
        }
    }
}

/**
 * \brief Token 用量（仅 GraphQL 返回）。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/**
 * \brief 健康检查结果。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/**
 * \brief 后端公开的 API 配置。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub version: String,
    pub supported_models: Vec<String>,
    pub max_tokens: u32,
    pub timestamp: String,
}
