//! 编排器单次请求的工作状态
//!
//! WorkingState 只在一次 `Orchestrator::process` 内存在，不作为整体持久化；
//! 其中的短期 / 长期索引是请求内的视图，真正写入存储的是回合处理器。

use serde::Serialize;
use serde_json::json;

use crate::agent::{AgentKind, TurnReply};
use crate::memory::{Message, MemoryRecord, Role, Turn};
use crate::tools::ToolOutcome;

/// 编排阶段：Ingest -> Route -> Invoke -> ToolPostProcess -> Format -> Done
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Ingest,
    Route,
    Invoke,
    ToolPostProcess,
    Format,
    Done,
}

/// 单次请求的内部状态
#[derive(Clone, Debug)]
pub struct WorkingState {
    pub stage: Stage,
    pub conversation_id: String,
    pub agent: AgentKind,
    pub history: Vec<Message>,
    pub short_term: Vec<MemoryRecord>,
    pub durable: Vec<MemoryRecord>,
    pub reply: Option<TurnReply>,
    pub error: Option<String>,
    pub tool_results: Vec<ToolOutcome>,
    pub final_text: Option<String>,
}

impl WorkingState {
    pub fn new(conversation_id: impl Into<String>, agent: AgentKind) -> Self {
        Self {
            stage: Stage::Ingest,
            conversation_id: conversation_id.into(),
            agent,
            history: Vec::new(),
            short_term: Vec::new(),
            durable: Vec::new(),
            reply: None,
            error: None,
            tool_results: Vec::new(),
            final_text: None,
        }
    }

    pub fn advance(&mut self, stage: Stage) {
        tracing::debug!(conversation_id = %self.conversation_id, from = ?self.stage, to = ?stage, "stage");
        self.stage = stage;
    }

    /// 记录用户输入
    pub fn ingest(&mut self, user_input: &str) {
        let turn = Turn::new(&self.conversation_id, Role::User, user_input);
        self.history.push(Message::user(user_input));
        self.short_term.push(turn.to_record());
    }

    /// 本批工具调用的系统摘要，写入长期索引
    pub fn record_tool_summary(&mut self) {
        if self.tool_results.is_empty() {
            return;
        }
        let mut record = Turn::new(&self.conversation_id, Role::System, "Tool execution").to_record();
        record.insert("tool_calls".to_string(), json!(self.tool_results));
        self.durable.push(record);
    }

    /// 记录最终回复文本
    pub fn finalize(&mut self, text: String) {
        let turn = Turn::new(&self.conversation_id, Role::Assistant, text.clone());
        self.history.push(Message::assistant(text.clone()));
        self.durable.push(turn.to_record());
        self.final_text = Some(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_summary_only_when_outcomes_exist() {
        let mut state = WorkingState::new("c1", AgentKind::OpenAi);
        state.record_tool_summary();
        assert!(state.durable.is_empty());

        state.tool_results.push(ToolOutcome {
            tool_name: "calculator".into(),
            input: Default::default(),
            output: Some(json!({"result": 4})),
            error: None,
        });
        state.record_tool_summary();
        assert_eq!(state.durable.len(), 1);
        assert_eq!(state.durable[0]["content"], "Tool execution");
        assert_eq!(state.durable[0]["tool_calls"][0]["tool_name"], "calculator");
    }

    #[test]
    fn test_ingest_and_finalize_track_history() {
        let mut state = WorkingState::new("c1", AgentKind::Groq);
        state.ingest("hi");
        state.finalize("hello".to_string());
        assert_eq!(state.history, vec![Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(state.short_term.len(), 1);
        assert_eq!(state.durable.len(), 1);
        assert_eq!(state.final_text.as_deref(), Some("hello"));
    }
}
