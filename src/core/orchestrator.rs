//! Agent 编排器：固定流程的请求处理
//!
//! Ingest（记录用户输入）-> Route（按 AgentKind 选择回合处理器）-> Invoke（带超时调用）
//! -> ToolPostProcess（工具批次摘要）-> Format（提取 / 覆盖最终文本）-> Done。
//!
//! Invoke 在独立任务中运行并持有 CancellationToken；超时后取消令牌并放弃结果，
//! 底层模型 / 工具调用是否立即停止不作保证。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentKind, TurnHandler};
use crate::core::{AgentError, Stage, WorkingState};
use crate::memory::{record_timestamp, MemoryRecord};
use crate::tools::ToolOutcome;

/// Invoke 阶段默认超时
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Error,
}

/// `process` 的返回值；error 时 message 为可读错误
#[derive(Clone, Debug, Serialize)]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub tool_results: Vec<ToolOutcome>,
    pub conversation_id: String,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ProcessStatus::Success
    }
}

/// 编排器：无请求级可变状态，可被多个请求并发共享
pub struct Orchestrator {
    handlers: HashMap<AgentKind, Arc<TurnHandler>>,
    passthrough_tools: Vec<String>,
    invoke_timeout: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            passthrough_tools: vec!["calculator".to_string()],
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
        }
    }

    pub fn with_handler(mut self, handler: TurnHandler) -> Self {
        self.handlers.insert(handler.kind(), Arc::new(handler));
        self
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// 这些工具的 output.result 非空时直接作为最终回复
    pub fn with_passthrough_tools(mut self, tools: Vec<String>) -> Self {
        self.passthrough_tools = tools;
        self
    }

    /// 已配置的 Agent 种类
    pub fn agents(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|kind| self.handlers.contains_key(kind))
            .collect()
    }

    /// 处理一条用户输入
    pub async fn process(
        &self,
        user_input: &str,
        agent: AgentKind,
        conversation_id: Option<String>,
    ) -> ProcessOutcome {
        let conversation_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut state = WorkingState::new(conversation_id, agent);

        state.ingest(user_input);
        tracing::info!(conversation_id = %state.conversation_id, agent = %agent, "processing input");

        state.advance(Stage::Route);
        let handler = self.handlers.get(&agent).cloned();

        state.advance(Stage::Invoke);
        match handler {
            Some(handler) => self.invoke(&mut state, handler, user_input).await,
            None => {
                state.error = Some(format!("No {} agent configured.", agent.display_name()));
            }
        }

        state.advance(Stage::ToolPostProcess);
        state.record_tool_summary();

        state.advance(Stage::Format);
        self.format(&mut state);

        state.advance(Stage::Done);
        match state.error {
            Some(message) => {
                tracing::error!(conversation_id = %state.conversation_id, error = %message, "request failed");
                ProcessOutcome {
                    status: ProcessStatus::Error,
                    response: None,
                    message: Some(message),
                    tool_results: state.tool_results,
                    conversation_id: state.conversation_id,
                }
            }
            None => ProcessOutcome {
                status: ProcessStatus::Success,
                response: state.final_text,
                message: None,
                tool_results: state.tool_results,
                conversation_id: state.conversation_id,
            },
        }
    }

    async fn invoke(&self, state: &mut WorkingState, handler: Arc<TurnHandler>, user_input: &str) {
        let name = state.agent.display_name();
        let token = CancellationToken::new();
        let child = token.clone();
        let conversation_id = state.conversation_id.clone();
        let input = user_input.to_string();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => Err(AgentError::Execution("cancelled".to_string())),
                result = handler.handle(Some(conversation_id.as_str()), &input) => result,
            }
        });

        match tokio::time::timeout(self.invoke_timeout, task).await {
            Ok(Ok(Ok(reply))) => {
                tracing::debug!(agent = name, content = %reply.content, "agent reply");
                state.tool_results = reply.tool_results.clone();
                state.reply = Some(reply);
            }
            Ok(Ok(Err(e))) => {
                state.error = Some(format!("Error processing with {name} agent: {e}"));
            }
            Ok(Err(join_err)) => {
                let e = AgentError::Execution(join_err.to_string());
                state.error = Some(format!("Error processing with {name} agent: {e}"));
            }
            Err(_) => {
                token.cancel();
                let e = AgentError::Timeout(format!("{name} agent"));
                tracing::error!(timeout_secs = self.invoke_timeout.as_secs_f64(), error = %e, "invoke abandoned");
                state.error = Some(format!("{name} agent processing timed out."));
            }
        }
    }

    fn format(&self, state: &mut WorkingState) {
        if let Some(error) = &state.error {
            state.final_text = Some(error.clone());
            return;
        }
        let Some(reply) = &state.reply else {
            state.final_text = Some("No valid response generated by agents.".to_string());
            return;
        };

        let text = passthrough_result(&state.tool_results, &self.passthrough_tools)
            .unwrap_or_else(|| reply.content.trim().to_string());
        tracing::debug!(final_text = %text, "formatted response");
        state.finalize(text);
    }

    /// 对话历史：合并两层，按时间从新到旧，截断到 limit
    pub async fn conversation_history(
        &self,
        conversation_id: &str,
        agent: AgentKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, AgentError> {
        let handler = self.handlers.get(&agent).ok_or_else(|| {
            AgentError::Config(format!("No {} agent configured", agent.display_name()))
        })?;
        let mut query = Map::new();
        query.insert("conversation_id".to_string(), json!(conversation_id));

        let mut records = handler.memory(conversation_id).retrieve(&query, true).await?;
        records.sort_by(|a, b| record_timestamp(b).total_cmp(&record_timestamp(a)));
        records.truncate(limit);
        Ok(records)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// 第一个来自直通工具、且 output.result 非 null 的结果
fn passthrough_result(outcomes: &[ToolOutcome], passthrough: &[String]) -> Option<String> {
    outcomes
        .iter()
        .filter(|o| passthrough.iter().any(|name| name == &o.tool_name))
        .find_map(|o| match o.output.as_ref()?.get("result")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, output: Option<Value>) -> ToolOutcome {
        ToolOutcome {
            tool_name: name.to_string(),
            input: Map::new(),
            error: output.is_none().then(|| "failed".to_string()),
            output,
        }
    }

    #[test]
    fn test_passthrough_picks_first_non_null_result() {
        let passthrough = vec!["calculator".to_string()];
        let outcomes = vec![
            outcome("text_converter", Some(json!({"result": "HI"}))),
            outcome("calculator", None),
            outcome("calculator", Some(json!({"result": null}))),
            outcome("calculator", Some(json!({"result": 4}))),
        ];
        assert_eq!(passthrough_result(&outcomes, &passthrough).as_deref(), Some("4"));
        assert_eq!(passthrough_result(&outcomes[..3], &passthrough), None);
    }

    #[test]
    fn test_passthrough_string_result_is_verbatim() {
        let outcomes = vec![outcome("text_converter", Some(json!({"result": "HI"})))];
        let passthrough = vec!["text_converter".to_string()];
        assert_eq!(passthrough_result(&outcomes, &passthrough).as_deref(), Some("HI"));
    }

    #[tokio::test]
    async fn test_unconfigured_agent_is_error_outcome() {
        let orchestrator = Orchestrator::new();
        assert!(orchestrator.agents().is_empty());
        let out = orchestrator.process("hi", AgentKind::Groq, Some("c1".into())).await;
        assert_eq!(out.status, ProcessStatus::Error);
        assert_eq!(out.conversation_id, "c1");
        assert!(out.message.unwrap().contains("Groq"));
    }
}
