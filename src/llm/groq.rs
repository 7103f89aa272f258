//! Groq API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.groq.com/openai/v1
//! - 默认模型: llama3-70b-8192

use crate::llm::OpenAiClient;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama3-70b-8192";

/// 创建 Groq 客户端
///
/// - API Key 读取环境变量 `GROQ_API_KEY`
/// - base_url / model 未配置时使用默认值
pub fn create_groq_client(base_url: Option<&str>, model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("GROQ_API_KEY").unwrap_or_else(|_| "gsk-placeholder".to_string());
    OpenAiClient::new(
        Some(base_url.unwrap_or(GROQ_BASE_URL)),
        model.unwrap_or(GROQ_DEFAULT_MODEL),
        Some(api_key.as_str()),
    )
}
