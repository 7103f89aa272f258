//! 工具箱：注册表、执行器、参数 schema 与内置工具（calculator、text_converter）

pub mod calculator;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod text_converter;

pub use calculator::CalculatorTool;
pub use executor::{ToolArgs, ToolCall, ToolExecutor, ToolOutcome};
pub use registry::{Tool, ToolRegistry, ToolSpec};
pub use text_converter::TextConverterTool;

/// 内置工具注册表（注册顺序即暴露给模型的顺序）
pub fn default_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);
    tools.register(TextConverterTool);
    tools
}
