//! Agent 回合处理器
//!
//! 每个 AgentKind 对应一个 TurnHandler：同一个短期缓存，各自的长期存储与 LLM 客户端。
//! 单回合状态机：
//! EnsureConversation -> LoadHistory -> BuildContext -> InvokeModel -> (ToolPhase) -> Persist -> Respond
//!
//! 回合内的任何错误都会被记录为一条仅写短期记忆的 system 轮次，再以 Err 返回给调用方。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{record_timestamp, MemoryFacade, MemoryStore, Message, Role, Turn};
use crate::tools::{ToolExecutor, ToolOutcome};

/// 可选的 Agent 种类（封闭集合）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    OpenAi,
    Groq,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::OpenAi, AgentKind::Groq];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::OpenAi => "openai",
            AgentKind::Groq => "groq",
        }
    }

    /// 面向用户的名称，用于错误信息
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::OpenAi => "OpenAI",
            AgentKind::Groq => "Groq",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AgentKind::OpenAi),
            "groq" => Ok(AgentKind::Groq),
            other => Err(format!("Invalid agent type: {other}")),
        }
    }
}

/// 单回合的回复
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReply {
    pub content: String,
    pub tool_results: Vec<ToolOutcome>,
}

/// 回合处理器：无对话级可变状态，可在多个并发请求间共享
pub struct TurnHandler {
    kind: AgentKind,
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    short_term: Arc<dyn MemoryStore>,
    long_term: Arc<dyn MemoryStore>,
    system_prompt: Option<String>,
}

impl TurnHandler {
    pub fn new(
        kind: AgentKind,
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        short_term: Arc<dyn MemoryStore>,
        long_term: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            kind,
            llm,
            executor,
            short_term,
            long_term,
            system_prompt: None,
        }
    }

    /// 设置系统提示词（空串视为不设置）
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// 绑定到指定对话的记忆门面
    pub fn memory(&self, conversation_id: &str) -> MemoryFacade {
        MemoryFacade::new(self.short_term.clone(), self.long_term.clone()).bind(conversation_id)
    }

    /// 处理一条用户输入；conversation_id 为空时生成新的对话 ID
    pub async fn handle(
        &self,
        conversation_id: Option<&str>,
        user_input: &str,
    ) -> Result<TurnReply, AgentError> {
        let conversation_id = match conversation_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tracing::info!(conversation_id = %id, "Created new conversation ID");
                id
            }
        };
        let memory = self.memory(&conversation_id);

        match self.run_turn(&memory, &conversation_id, user_input).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::error!(agent = %self.kind, conversation_id = %conversation_id, error = %e, "turn failed");
                let note = format!("Error processing with {}: {}", self.kind.display_name(), e);
                let turn = Turn::new(&conversation_id, Role::System, note);
                if let Err(persist_err) = memory.persist(&turn.to_record(), false).await {
                    tracing::warn!(error = %persist_err, "could not record failed turn");
                }
                Err(e)
            }
        }
    }

    async fn run_turn(
        &self,
        memory: &MemoryFacade,
        conversation_id: &str,
        user_input: &str,
    ) -> Result<TurnReply, AgentError> {
        // 历史只取短期记忆
        let mut query = Map::new();
        query.insert("conversation_id".to_string(), json!(conversation_id));
        let mut history = memory.retrieve(&query, false).await?;
        history.sort_by(|a, b| record_timestamp(a).total_cmp(&record_timestamp(b)));
        tracing::debug!(agent = %self.kind, entries = history.len(), "loaded history");

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(history.iter().map(Turn::message_from_record));
        messages.push(Message::user(user_input));

        let user_turn = Turn::new(conversation_id, Role::User, user_input);
        memory.persist(&user_turn.to_record(), false).await?;

        let specs = self.executor.list_specs();
        let tools = (!specs.is_empty()).then_some(specs.as_slice());
        tracing::info!(
            agent = %self.kind,
            model = self.llm.model(),
            messages = messages.len(),
            tools = specs.len(),
            "invoking model"
        );
        let reply = self.llm.invoke(&messages, tools).await?;

        let tool_results = if reply.tool_calls.is_empty() {
            Vec::new()
        } else {
            tracing::info!(agent = %self.kind, calls = reply.tool_calls.len(), "executing tool calls");
            self.executor.dispatch_all(&reply.tool_calls).await
        };

        let assistant_turn = Turn::new(conversation_id, Role::Assistant, reply.content.clone())
            .with_tool_results(tool_results.clone());
        memory.persist(&assistant_turn.to_record(), true).await?;

        Ok(TurnReply {
            content: reply.content,
            tool_results,
        })
    }
}
