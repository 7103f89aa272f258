//! LLM 层：客户端抽象与实现（OpenAI / Groq / Mock）

pub mod groq;
pub mod mock;
pub mod openai;
pub mod traits;

pub use groq::{create_groq_client, GROQ_BASE_URL, GROQ_DEFAULT_MODEL};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OPENAI_DEFAULT_MODEL};
pub use traits::{LlmClient, LlmError, ModelReply};
