//! Concierge - 多智能体对话路由
//!
//! 模块划分：
//! - **agent**: Agent 种类与单回合处理器（历史 -> 模型 -> 工具 -> 持久化）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器、请求工作状态、错误类型、应用构建器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Groq / Mock）
//! - **memory**: 短期缓存、长期存储（SQLite / JSON 文档）与双层门面
//! - **observability**: tracing 初始化
//! - **tools**: 工具注册表、执行器与内置工具（calculator、text_converter）
//! - **server**: HTTP API（feature `web`）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
#[cfg(feature = "web")]
pub mod server;
pub mod tools;

pub use crate::agent::{AgentKind, TurnHandler, TurnReply};
pub use crate::core::{AppBuilder, Orchestrator, ProcessOutcome, ProcessStatus};
