//! 工具执行器
//!
//! 持有 ToolRegistry 与单次调用超时。dispatch 永不返回错误：未知工具、执行失败、超时
//! 都记录为 ToolOutcome.error；参数解码失败退化为空参数。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::tools::{ToolRegistry, ToolSpec};

/// 模型给出的工具参数：结构化对象或编码后的 JSON 字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArgs {
    Structured(Map<String, Value>),
    Encoded(String),
}

impl Default for ToolArgs {
    fn default() -> Self {
        ToolArgs::Structured(Map::new())
    }
}

impl ToolArgs {
    /// 解码为参数对象；无法解码或不是对象时返回空对象
    pub fn decode(&self) -> Map<String, Value> {
        match self {
            ToolArgs::Structured(map) => map.clone(),
            ToolArgs::Encoded(raw) if raw.trim().is_empty() => Map::new(),
            ToolArgs::Encoded(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    tracing::warn!(args = %other, "tool args are not an object, using empty args");
                    Map::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, raw = %preview(raw), "could not parse tool args, using empty args");
                    Map::new()
                }
            },
        }
    }
}

/// 模型请求的一次工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

/// 一次工具调用的结果：output 与 error 二选一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 工具执行器
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 按注册顺序返回工具描述
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// 执行单次调用，结果总是一个 ToolOutcome
    pub async fn dispatch(&self, name: &str, args: &ToolArgs) -> ToolOutcome {
        let input = args.decode();
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!(tool = %name, "tool not found");
            return ToolOutcome {
                tool_name: name.to_string(),
                input,
                output: None,
                error: Some(format!("Tool not found: {name}")),
            };
        };

        let start = Instant::now();
        let args_preview = preview(&Value::Object(input.clone()).to_string());
        let result = timeout(self.timeout, tool.execute(input.clone())).await;

        let outcome_label = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": outcome_label == "ok",
            "outcome": outcome_label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        let (output, error) = match result {
            Ok(Ok(value)) => (Some(value), None),
            Ok(Err(e)) => (None, Some(e)),
            Err(_) => (
                None,
                Some(format!("Tool {name} timed out after {}s", self.timeout.as_secs())),
            ),
        };
        ToolOutcome {
            tool_name: name.to_string(),
            input,
            output,
            error,
        }
    }

    /// 执行一批调用；每个调用相互独立，结果顺序与请求一致。缺少名称的调用被跳过
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        let futures = calls
            .iter()
            .filter(|call| {
                if call.name.trim().is_empty() {
                    tracing::warn!("tool name is missing, skipping this tool call");
                    false
                } else {
                    true
                }
            })
            .map(|call| self.dispatch(&call.name, &call.args));
        join_all(futures).await
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
