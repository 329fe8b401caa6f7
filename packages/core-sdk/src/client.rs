use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::EndpointConfig;
use crate::error::DispatchError;
use crate::graphql::GraphqlTransport;
use crate::models::{DispatchRequest, Reply};
use crate::rest::RestTransport;

/**
 * \brief 传输协议抽象：一次请求，一次响应，结果要么是回复要么是分类错误。
 */
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &DispatchRequest) -> Result<Reply, DispatchError>;
}

/**
 * \brief 调用方持有的传输模式开关，可在两次调用之间切换。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    Rest,
    #[default]
    Graphql,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Rest => "rest",
            TransportMode::Graphql => "graphql",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(TransportMode::Rest),
            "graphql" | "gql" => Ok(TransportMode::Graphql),
            other => Err(format!("unknown transport: {} (expected rest|graphql)", other)),
        }
    }
}

/**
 * \brief 消息分发客户端。无内部可变状态，可被多个调用方并发使用。
 */
#[derive(Clone)]
pub struct ChatClient {
    rest: Arc<dyn Transport>,
    graphql: Arc<dyn Transport>,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient").finish_non_exhaustive()
    }
}

impl ChatClient {
    /**
     * \brief 注入任意两个传输实现（测试替身或自定义客户端）。
     */
    pub fn new(rest: impl Transport + 'static, graphql: impl Transport + 'static) -> Self {
        Self {
            rest: Arc::new(rest),
            graphql: Arc::new(graphql),
        }
    }

    /**
     * \brief 按端点配置构造，两个传输共享同一个 HTTP 连接池。
     */
    pub fn from_config(config: &EndpointConfig) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::new(
            RestTransport::new(http.clone(), config.rest_url.clone()),
            GraphqlTransport::new(http, config.graphql_url.clone()),
        ))
    }

    fn transport(&self, mode: TransportMode) -> &dyn Transport {
        match mode {
            TransportMode::Rest => self.rest.as_ref(),
            TransportMode::Graphql => self.graphql.as_ref(),
        }
    }

    /**
     * \brief 发送一条消息并返回回复文本。
     * \param message 已去除首尾空白的非空消息
     * \param mode    本次调用使用的传输协议
     */
    pub async fn dispatch(
        &self,
        message: &str,
        mode: TransportMode,
    ) -> Result<String, DispatchError> {
        self.dispatch_request(&DispatchRequest::new(message), mode)
            .await
            .map(|r| r.reply)
    }

    /**
     * \brief 与 dispatch 相同，但保留时间戳与用量等元数据。
     */
    pub async fn dispatch_request(
        &self,
        request: &DispatchRequest,
        mode: TransportMode,
    ) -> Result<Reply, DispatchError> {
        let result = self.transport(mode).send(request).await;
        match &result {
            Ok(reply) => info!(
                transport = %mode,
                message_len = request.message.len(),
                reply_len = reply.reply.len(),
                "dispatch ok"
            ),
            Err(e) => warn!(
                transport = %mode,
                message_len = request.message.len(),
                kind = %e.kind,
                status = ?e.status,
                error = %e,
                "dispatch failed"
            ),
        }
        result
    }
}
