//! 文本大小写转换工具

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::schema::{parameters_schema, parse_args};
use crate::tools::Tool;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ToUpper,
    ToLower,
}

/// text_converter 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TextConverterArgs {
    /// The text to convert
    pub text: String,
    /// The operation to perform (to_upper or to_lower)
    pub operation: Operation,
}

pub struct TextConverterTool;

#[async_trait]
impl Tool for TextConverterTool {
    fn name(&self) -> &str {
        "text_converter"
    }

    fn description(&self) -> &str {
        "Converts text to uppercase or lowercase based on the specified operation."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<TextConverterArgs>()
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String> {
        let args: TextConverterArgs = parse_args(self.name(), args)?;
        let (result, op) = match args.operation {
            Operation::ToUpper => (args.text.to_uppercase(), "to_upper"),
            Operation::ToLower => (args.text.to_lowercase(), "to_lower"),
        };
        Ok(json!({
            "status": "success",
            "result": result,
            "operation": op,
            "input_text": args.text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_convert_both_ways() {
        let out = TextConverterTool
            .execute(args(json!({"text": "Hello", "operation": "to_upper"})))
            .await
            .unwrap();
        assert_eq!(out["result"], "HELLO");

        let out = TextConverterTool
            .execute(args(json!({"text": "Hello", "operation": "to_lower"})))
            .await
            .unwrap();
        assert_eq!(out["result"], "hello");
    }

    #[tokio::test]
    async fn test_unknown_operation_is_error() {
        let err = TextConverterTool
            .execute(args(json!({"text": "Hello", "operation": "reverse"})))
            .await
            .unwrap_err();
        assert!(err.contains("Invalid arguments for text_converter"));
    }
}
