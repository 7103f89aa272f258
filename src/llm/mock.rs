//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 取最后一条 User 消息：若看起来是算式且提供了 calculator 工具，则请求调用 calculator；
//! 否则回显文本。

use async_trait::async_trait;
use serde_json::{json, Map};

use crate::llm::{LlmClient, LlmError, ModelReply};
use crate::memory::{Message, Role};
use crate::tools::{ToolArgs, ToolCall, ToolSpec};

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn looks_like_arithmetic(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/().".contains(c))
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ModelReply, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.trim())
            .unwrap_or("(no input)");

        let has_calculator = tools
            .unwrap_or_default()
            .iter()
            .any(|t| t.name == "calculator");

        if has_calculator && looks_like_arithmetic(last_user) {
            let mut args = Map::new();
            args.insert("expression".to_string(), json!(last_user));
            return Ok(ModelReply::text(format!("Let me calculate {last_user}.")).with_tool_call(
                ToolCall {
                    name: "calculator".to_string(),
                    args: ToolArgs::Structured(args),
                },
            ));
        }

        Ok(ModelReply::text(format!("Echo from Mock: {last_user}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_without_tools() {
        let reply = MockLlmClient
            .invoke(&[Message::user("2+2")], None)
            .await
            .unwrap();
        assert_eq!(reply.content, "Echo from Mock: 2+2");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_arithmetic_detection() {
        assert!(looks_like_arithmetic("(3 + 4) * 5"));
        assert!(!looks_like_arithmetic("hello 2"));
        assert!(!looks_like_arithmetic("+-"));
    }
}
