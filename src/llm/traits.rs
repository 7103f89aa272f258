//! LLM 客户端抽象
//!
//! 所有后端（OpenAI / Groq / Mock）实现 LlmClient::invoke：输入角色消息序列与可选工具描述，
//! 输出文本与可选的工具调用请求。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;
use crate::tools::{ToolCall, ToolSpec};

/// 模型调用失败
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cancelled")]
    Cancelled,
}

/// 一次模型调用的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 模型名（日志用）
    fn model(&self) -> &str;

    /// tools 为 None 表示本次不提供任何工具
    async fn invoke(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ModelReply, LlmError>;
}
