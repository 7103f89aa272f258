//! 应用构建器：从 AppConfig 组装存储、工具、LLM 与编排器
//!
//! CLI 与 HTTP 入口共用同一套组装逻辑：两个 Agent 共享一个短期缓存，
//! openai 使用 JSON 文档长期存储，groq 使用 SQLite 长期存储。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::agent::{AgentKind, TurnHandler};
use crate::config::AppConfig;
use crate::core::Orchestrator;
use crate::llm::{
    create_groq_client, LlmClient, MockLlmClient, OpenAiClient, GROQ_DEFAULT_MODEL,
    OPENAI_DEFAULT_MODEL,
};
use crate::memory::{JsonFileStore, MemoryStore, ShortTermCache, SqliteStore};
use crate::tools::{default_registry, ToolExecutor};

pub struct AppBuilder {
    config: AppConfig,
    llm_overrides: HashMap<AgentKind, Arc<dyn LlmClient>>,
    long_term_overrides: HashMap<AgentKind, Arc<dyn MemoryStore>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm_overrides: HashMap::new(),
            long_term_overrides: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 替换某个 Agent 的模型客户端（测试或离线运行）
    pub fn with_llm(mut self, kind: AgentKind, llm: Arc<dyn LlmClient>) -> Self {
        self.llm_overrides.insert(kind, llm);
        self
    }

    /// 替换某个 Agent 的长期存储
    pub fn with_long_term(mut self, kind: AgentKind, store: Arc<dyn MemoryStore>) -> Self {
        self.long_term_overrides.insert(kind, store);
        self
    }

    /// 根据配置与环境变量选择 LLM 后端；缺少 API Key 时退回 Mock
    pub fn build_llm(&self, kind: AgentKind) -> Arc<dyn LlmClient> {
        if let Some(llm) = self.llm_overrides.get(&kind) {
            return llm.clone();
        }
        let section = match kind {
            AgentKind::OpenAi => &self.config.llm.openai,
            AgentKind::Groq => &self.config.llm.groq,
        };
        let model = Some(section.model.as_str()).filter(|m| !m.is_empty());
        let base_url = section.base_url.as_deref();

        match kind {
            AgentKind::OpenAi => match std::env::var("OPENAI_API_KEY") {
                Ok(key) => {
                    let model = model.unwrap_or(OPENAI_DEFAULT_MODEL);
                    tracing::info!("Using OpenAI LLM ({})", model);
                    Arc::new(OpenAiClient::new(base_url, model, Some(key.as_str())))
                }
                Err(_) => {
                    tracing::warn!("OPENAI_API_KEY not set, openai agent uses the mock model");
                    Arc::new(MockLlmClient)
                }
            },
            AgentKind::Groq => {
                if std::env::var("GROQ_API_KEY").is_ok() {
                    tracing::info!("Using Groq LLM ({})", model.unwrap_or(GROQ_DEFAULT_MODEL));
                    Arc::new(create_groq_client(base_url, model))
                } else {
                    tracing::warn!("GROQ_API_KEY not set, groq agent uses the mock model");
                    Arc::new(MockLlmClient)
                }
            }
        }
    }

    pub fn build_short_term(&self) -> Arc<ShortTermCache> {
        Arc::new(ShortTermCache::new(
            self.config.memory.cache_max_size,
            Duration::from_secs(self.config.memory.expiration_secs),
        ))
    }

    pub fn build_long_term(&self, kind: AgentKind) -> anyhow::Result<Arc<dyn MemoryStore>> {
        if let Some(store) = self.long_term_overrides.get(&kind) {
            return Ok(store.clone());
        }
        let storage = &self.config.storage;
        let store: Arc<dyn MemoryStore> = match kind {
            AgentKind::OpenAi => Arc::new(
                JsonFileStore::open(&storage.document_path).with_context(|| {
                    format!("Failed to open document store {}", storage.document_path.display())
                })?,
            ),
            AgentKind::Groq => Arc::new(SqliteStore::open(&storage.sqlite_path).with_context(
                || format!("Failed to open sqlite store {}", storage.sqlite_path.display()),
            )?),
        };
        Ok(store)
    }

    pub fn build_tool_executor(&self) -> Arc<ToolExecutor> {
        Arc::new(ToolExecutor::new(
            default_registry(),
            self.config.tools.tool_timeout_secs,
        ))
    }

    /// 组装编排器
    pub fn build(self) -> anyhow::Result<Orchestrator> {
        let short_term = self.build_short_term();
        let executor = self.build_tool_executor();
        let orchestrator_cfg = &self.config.orchestrator;

        let mut orchestrator = Orchestrator::new()
            .with_invoke_timeout(Duration::from_secs(orchestrator_cfg.invoke_timeout_secs))
            .with_passthrough_tools(orchestrator_cfg.passthrough_tools.clone());

        for kind in AgentKind::ALL {
            let mut handler = TurnHandler::new(
                kind,
                self.build_llm(kind),
                executor.clone(),
                short_term.clone(),
                self.build_long_term(kind)?,
            );
            if let Some(prompt) = &self.config.llm.system_prompt {
                handler = handler.with_system_prompt(prompt.clone());
            }
            orchestrator = orchestrator.with_handler(handler);
        }

        tracing::info!(
            agents = ?orchestrator.agents(),
            tools = ?executor.tool_names(),
            "orchestrator ready"
        );
        Ok(orchestrator)
    }
}
