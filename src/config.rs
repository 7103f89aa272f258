//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CONCIERGE__*` 覆盖（双下划线表示嵌套，
//! 如 `CONCIERGE__SERVER__PORT=9000`）。列表键用逗号分隔，
//! 如 `CONCIERGE__ORCHESTRATOR__PASSTHROUGH_TOOLS=calculator,text_converter`。API Key 不进配置文件，只读 `OPENAI_API_KEY` / `GROQ_API_KEY`。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub memory: MemorySection,
    pub storage: StorageSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub tools: ToolsSection,
    pub server: ServerSection,
}

/// [memory] 段：短期缓存容量与过期窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub cache_max_size: usize,
    pub expiration_secs: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            cache_max_size: 1000,
            expiration_secs: 3600,
        }
    }
}

/// [storage] 段：长期存储位置（groq 用 SQLite，openai 用 JSON 文档）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub sqlite_path: PathBuf,
    pub document_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/memory.db"),
            document_path: PathBuf::from("data/memory.json"),
        }
    }
}

/// [llm] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub openai: ProviderSection,
    pub groq: ProviderSection,
    /// 可选系统提示词，两个 Agent 共用
    pub system_prompt: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            openai: ProviderSection {
                model: "gpt-4o-mini".to_string(),
                base_url: None,
            },
            groq: ProviderSection {
                model: "llama3-70b-8192".to_string(),
                base_url: Some("https://api.groq.com/openai/v1".to_string()),
            },
            system_prompt: None,
        }
    }
}

/// [llm.openai] / [llm.groq]
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderSection {
    #[serde(default)]
    pub model: String,
    pub base_url: Option<String>,
}

/// [orchestrator] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 单次 Agent 调用上限（秒）
    pub invoke_timeout_secs: u64,
    /// 输出的 result 直接作为最终回复的工具
    pub passthrough_tools: Vec<String>,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            invoke_timeout_secs: 30,
            passthrough_tools: vec!["calculator".to_string()],
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerSection {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 从 config 目录加载配置，环境变量 CONCIERGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CONCIERGE__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(environment(None));

    builder.build()?.try_deserialize()
}

/// `CONCIERGE__*` 环境变量源；source 为 None 时读取进程环境
fn environment(source: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix("CONCIERGE")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("orchestrator.passthrough_tools")
        .try_parsing(true)
        .source(source)
}

/// 加载失败时退回默认配置并告警
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    }
}
