//! 对话轮次：Turn（存储单元）与 Message（送入 LLM 的角色消息）
//!
//! 一个对话不是单个文档，而是一组独立的 `conversation_id:timestamp` 键记录；
//! Turn 负责与 MemoryRecord（JSON 对象）互转。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::memory::MemoryRecord;
use crate::tools::ToolOutcome;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// 未知角色按 user 处理
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 一条已落盘的对话轮次
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Unix 秒（含小数）；同一对话内相同时间戳的两条记录会互相覆盖
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolOutcome>>,
}

impl Turn {
    pub fn new(conversation_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            timestamp: now_timestamp(),
            tool_results: None,
        }
    }

    pub fn with_tool_results(mut self, outcomes: Vec<ToolOutcome>) -> Self {
        if !outcomes.is_empty() {
            self.tool_results = Some(outcomes);
        }
        self
    }

    pub fn to_record(&self) -> MemoryRecord {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// 从任意记录宽松还原为消息：缺失 role 视为 user，缺失 content 视为空串
    pub fn message_from_record(record: &MemoryRecord) -> Message {
        let role = record
            .get("role")
            .and_then(Value::as_str)
            .map(Role::parse)
            .unwrap_or(Role::User);
        let content = record
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Message { role, content }
    }
}

/// 当前 Unix 时间（秒，微秒精度）
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// 读取记录中的时间戳，缺失或非数字时为 0
pub fn record_timestamp(record: &MemoryRecord) -> f64 {
    record
        .get("timestamp")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_record_shape() {
        let mut turn = Turn::new("c1", Role::User, "hi");
        turn.timestamp = 100.0;
        let record = turn.to_record();
        assert_eq!(record.get("conversation_id"), Some(&json!("c1")));
        assert_eq!(record.get("role"), Some(&json!("user")));
        assert_eq!(record.get("timestamp"), Some(&json!(100.0)));
        assert!(!record.contains_key("tool_results"));
    }

    #[test]
    fn test_message_from_loose_record() {
        let record = json!({"role": "tool", "content": "x"});
        let msg = Turn::message_from_record(record.as_object().unwrap());
        assert_eq!(msg, Message::user("x"));

        let record = json!({"role": "system"});
        let msg = Turn::message_from_record(record.as_object().unwrap());
        assert_eq!(msg, Message::system(""));
    }
}
