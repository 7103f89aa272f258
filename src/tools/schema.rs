//! 工具参数 JSON Schema 生成（schemars）
//!
//! 工具的参数结构体派生 JsonSchema，由此生成 ToolSpec.parameters，保证 schema 与实际解析一致。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// 返回参数结构体 T 的 JSON Schema
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    })
}

/// 将参数对象解析为 T；失败时返回可读的错误信息
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| format!("Invalid arguments for {tool}: {e}"))
}
