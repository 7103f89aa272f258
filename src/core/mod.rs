//! 核心编排层：错误类型、请求工作状态、编排器与应用构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::AppBuilder;
pub use error::AgentError;
pub use orchestrator::{Orchestrator, ProcessOutcome, ProcessStatus, DEFAULT_INVOKE_TIMEOUT};
pub use state::{Stage, WorkingState};
