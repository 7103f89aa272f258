//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Groq 也走这里。
//! 只做单轮请求：发送消息与工具描述，取首个 choice 的文本与 function 类工具调用。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ModelReply};
use crate::memory::{Message, Role};
use crate::tools::{ToolArgs, ToolCall, ToolSpec};

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let build_err = |e: async_openai::error::OpenAIError| LlmError::Request(e.to_string());
        messages
            .iter()
            .map(|m| {
                Ok(match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(build_err)?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(build_err)?,
                    ),
                    Role::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(build_err)?,
                    ),
                })
            })
            .collect()
    }

    fn to_openai_tools(&self, specs: &[ToolSpec]) -> Result<Vec<ChatCompletionTools>, LlmError> {
        specs
            .iter()
            .map(|spec| {
                let function = FunctionObjectArgs::default()
                    .name(spec.name.clone())
                    .description(spec.description.clone())
                    .parameters(spec.parameters.clone())
                    .build()
                    .map_err(|e| LlmError::Request(e.to_string()))?;
                Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ModelReply, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(self.to_openai_messages(messages)?);
        if let Some(specs) = tools.filter(|t| !t.is_empty()) {
            args.tools(self.to_openai_tools(specs)?);
        }
        let request = args.build().map_err(|e| LlmError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm usage"
            );
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCall {
                    name: call.function.name,
                    args: ToolArgs::Encoded(call.function.arguments),
                }),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .collect();

        Ok(ModelReply {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}
