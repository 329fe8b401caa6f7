use std::fmt;

use thiserror::Error;

/**
 * \brief 失败调用的分类。与后端 errorType 字段同名（SCREAMING_SNAKE）。
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /** \brief 无法连到端点，或响应结构无法识别 */
    NetworkError,
    /** \brief 非 2xx 且没有可解析的错误体 */
    HttpError,
    /** \brief REST 后端显式返回 status=error */
    ApiError,
    /** \brief GraphQL 后端显式返回 ERROR 或 errors 数组 */
    GraphqlError,
    UnknownError,
    InsufficientBalance,
    InvalidApiKey,
    RateLimitExceeded,
    /** \brief 后端给出的其他子类型，原样保留 */
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::HttpError => "HTTP_ERROR",
            ErrorKind::ApiError => "API_ERROR",
            ErrorKind::GraphqlError => "GRAPHQL_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::InvalidApiKey => "INVALID_API_KEY",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Other(name) => name,
        }
    }

    /**
     * \brief 解析后端 errorType；空串视为未分类。
     *
     * NETWORK_ERROR / HTTP_ERROR / UNKNOWN_ERROR 只由客户端自身产生，
     * 后端给出这些名字时原样保留在 Other 中，仍算作后端报告。
     */
    pub fn from_wire(name: &str) -> Self {
        match name.trim() {
            "" => ErrorKind::UnknownError,
            "API_ERROR" => ErrorKind::ApiError,
            "GRAPHQL_ERROR" => ErrorKind::GraphqlError,
            "INSUFFICIENT_BALANCE" => ErrorKind::InsufficientBalance,
            "INVALID_API_KEY" => ErrorKind::InvalidApiKey,
            "RATE_LIMIT_EXCEEDED" => ErrorKind::RateLimitExceeded,
            other => ErrorKind::Other(other.to_string()),
        }
    }

    /**
     * \brief 是否为后端主动报告的错误（含所有业务子类型）。
     */
    pub fn is_backend_reported(&self) -> bool {
        !matches!(
            self,
            ErrorKind::NetworkError | ErrorKind::HttpError | ErrorKind::UnknownError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/**
 * \brief 一次 dispatch 的分类错误，作为值返回而非抛出。
 */
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
    /** \brief HTTP 状态码（若已收到响应） */
    pub status: Option<u16>,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn http(status: u16) -> Self {
        Self::http_with_message(status, None)
    }

    /**
     * \brief 非 2xx 且无类型化错误体；若响应体带 error 文本则沿用。
     */
    pub fn http_with_message(status: u16, message: Option<String>) -> Self {
        let message =
            message.unwrap_or_else(|| format!("request failed with status {}", status));
        Self::new(ErrorKind::HttpError, message).with_status(status)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiError, message)
    }

    pub fn graphql(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GraphqlError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownError, message)
    }

    /**
     * \brief 由后端 errorType 构造；缺失时落到 fallback 分类。
     */
    pub fn reported(
        error_type: Option<&str>,
        fallback: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let kind = match error_type.map(str::trim) {
            Some(name) if !name.is_empty() => ErrorKind::from_wire(name),
            _ => fallback,
        };
        Self::new(kind, message)
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        let mut out = DispatchError::network(err.to_string());
        out.status = err.status().map(|s| s.as_u16());
        out
    }
}
