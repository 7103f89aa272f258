//! Agent 错误类型
//!
//! 存储与工具层从不抛错（返回 false / 空 / 结构化结果）；只有回合处理器与编排器
//! 会把这里的错误转换成 system 轮次日志与 error 状态响应。

use thiserror::Error;

use crate::llm::LlmError;

/// 回合处理与编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 记忆操作缺少对话 ID
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("{0} timed out")]
    Timeout(String),

    /// 任务 panic、被取消等非预期故障
    #[error("Execution failed: {0}")]
    Execution(String),
}
