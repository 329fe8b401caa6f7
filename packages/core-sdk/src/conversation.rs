use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::client::{ChatClient, TransportMode};
use crate::error::DispatchError;
use crate::models::{ChatMessage, Role};

pub const GREETING: &str = "你好！我是 **AI助手**，可以为您提供智能对话服务。\n\n\
我可以帮助您：\n- 回答各种问题\n- 提供代码示例\n- 解释复杂概念\n- 协助文档编写\n\n\
有什么可以帮助您的吗？";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
    #[error("nothing to resend")]
    NothingToResend,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/**
 * \brief 会话控制器：持有只追加的消息列表与最近一次错误。
 *
 * 每轮用户输入调用一次 ChatClient；失败时不生成助手消息，保留草稿以便重发。
 */
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    last_error: Option<DispatchError>,
    failed_draft: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * \brief 以助手欢迎语开场。
     */
    pub fn with_greeting(greeting: &str) -> Self {
        let mut conv = Self::new();
        conv.push(Role::Assistant, greeting.to_string());
        conv
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_error(&self) -> Option<&DispatchError> {
        self.last_error.as_ref()
    }

    pub fn failed_draft(&self) -> Option<&str> {
        self.failed_draft.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /**
     * \brief 提交一轮用户输入。
     * \param input 原始输入，去除首尾空白后不能为空
     * \return 成功时返回新追加的助手消息
     */
    pub async fn submit(
        &mut self,
        client: &ChatClient,
        input: &str,
        mode: TransportMode,
    ) -> Result<&ChatMessage, SubmitError> {
        let content = input.trim();
        if content.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        self.last_error = None;
        self.failed_draft = None;
        self.push(Role::User, content.to_string());
        self.exchange(client, content.to_string(), mode).await
    }

    /**
     * \brief 重发上次失败的草稿，不重复追加用户消息。
     */
    pub async fn resend(
        &mut self,
        client: &ChatClient,
        mode: TransportMode,
    ) -> Result<&ChatMessage, SubmitError> {
        let draft = self.failed_draft.take().ok_or(SubmitError::NothingToResend)?;
        self.last_error = None;
        self.exchange(client, draft, mode).await
    }

    async fn exchange(
        &mut self,
        client: &ChatClient,
        content: String,
        mode: TransportMode,
    ) -> Result<&ChatMessage, SubmitError> {
        match client.dispatch(&content, mode).await {
            Ok(reply) => Ok(self.push(Role::Assistant, reply)),
            Err(e) => {
                debug!(kind = %e.kind, "turn failed, keeping draft");
                self.failed_draft = Some(content);
                self.last_error = Some(e.clone());
                Err(SubmitError::Dispatch(e))
            }
        }
    }

    fn push(&mut self, role: Role, content: String) -> &ChatMessage {
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            content,
            role,
            timestamp: OffsetDateTime::now_utc(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /**
     * \brief 导出会话记录为 JSON。
     */
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.messages)
    }
}
