//! HTTP API（feature `web`）
//!
//! - POST /api/chat                     {message, agent_type, conversation_id?}
//! - GET  /api/conversations/:id        ?limit=10&agent_type=openai，按时间从新到旧
//! - GET  /api/agents
//! - GET  /api/health

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::agent::AgentKind;
use crate::core::{Orchestrator, ProcessStatus};
use crate::memory::MemoryRecord;
use crate::tools::ToolOutcome;

const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub agent_type: AgentKind,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolOutcome>>,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub agent_type: AgentKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<MemoryRecord>,
}

/// 构建路由；编排器在所有请求间共享
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/conversations/:id", get(api_conversation))
        .route("/api/agents", get(api_agents))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(orchestrator)
}

async fn api_chat(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let outcome = orchestrator
        .process(message, req.agent_type, req.conversation_id)
        .await;

    let response = match outcome.status {
        ProcessStatus::Success => ChatResponse {
            status: "success".to_string(),
            response: outcome.response,
            tool_results: Some(outcome.tool_results),
            conversation_id: outcome.conversation_id,
            error: None,
        },
        ProcessStatus::Error => ChatResponse {
            status: "error".to_string(),
            response: None,
            tool_results: None,
            conversation_id: outcome.conversation_id,
            error: outcome.message,
        },
    };
    Ok(Json(response))
}

async fn api_conversation(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(conversation_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = orchestrator
        .conversation_history(&conversation_id, q.agent_type, limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(HistoryResponse {
        conversation_id,
        messages,
    }))
}

async fn api_agents(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<AgentKind>> {
    Json(orchestrator.agents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::AppBuilder;
    use crate::llm::MockLlmClient;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        let mut config = AppConfig::default();
        config.storage.sqlite_path = dir.join("memory.db");
        config.storage.document_path = dir.join("memory.json");
        let orchestrator = AppBuilder::new(config)
            .with_llm(AgentKind::OpenAi, Arc::new(MockLlmClient))
            .with_llm(AgentKind::Groq, Arc::new(MockLlmClient))
            .build()
            .unwrap();
        router(Arc::new(orchestrator))
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_calculator_passthrough_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let res = app
            .clone()
            .oneshot(post_chat(json!({"message": "2+2", "agent_type": "groq", "conversation_id": "c9"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["response"], "4");
        assert_eq!(body["conversation_id"], "c9");
        assert_eq!(body["tool_results"][0]["tool_name"], "calculator");

        let res = app
            .oneshot(
                Request::get("/api/conversations/c9?limit=1&agent_type=groq")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(res).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let res = app(dir.path())
            .oneshot(post_chat(json!({"message": "  "})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_agents_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let res = app
            .clone()
            .oneshot(Request::get("/api/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(res).await, json!(["openai", "groq"]));

        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
