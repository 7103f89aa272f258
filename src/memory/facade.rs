//! 双层记忆门面：绑定一个对话 ID 与一对存储（短期 + 长期）
//!
//! 写：总是写短期，按需同时写长期；读：总是查短期，按需合并长期结果并做精确去重。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::core::AgentError;
use crate::memory::store::{record_identity, MemoryRecord, MemoryStore};

#[derive(Clone)]
pub struct MemoryFacade {
    short_term: Arc<dyn MemoryStore>,
    long_term: Arc<dyn MemoryStore>,
    conversation_id: Option<String>,
}

impl MemoryFacade {
    pub fn new(short_term: Arc<dyn MemoryStore>, long_term: Arc<dyn MemoryStore>) -> Self {
        Self {
            short_term,
            long_term,
            conversation_id: None,
        }
    }

    pub fn bind(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    fn require_conversation(&self) -> Result<&str, AgentError> {
        self.conversation_id
            .as_deref()
            .ok_or_else(|| AgentError::Config("Conversation ID not set".to_string()))
    }

    /// 存储键：`conversation_id:timestamp`；缺失时间戳时用 `unknown`
    pub fn key_for(conversation_id: &str, record: &MemoryRecord) -> String {
        let stamp = match record.get("timestamp") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };
        format!("{conversation_id}:{stamp}")
    }

    /// 写入一条记录；返回两层写入是否都成功（未写长期时只看短期）
    pub async fn persist(&self, record: &MemoryRecord, also_durable: bool) -> Result<bool, AgentError> {
        let conversation_id = self.require_conversation()?;
        let key = Self::key_for(conversation_id, record);

        let short_ok = self.short_term.save(&key, record).await;
        let long_ok = if also_durable {
            self.long_term.save(&key, record).await
        } else {
            true
        };
        if !(short_ok && long_ok) {
            tracing::warn!(
                key = %key,
                short_term = short_ok,
                long_term = long_ok,
                backend = self.long_term.name(),
                "memory persist partially failed"
            );
        }
        Ok(short_ok && long_ok)
    }

    /// 查询记忆；include_durable 时按首次出现顺序合并两层（短期在前），
    /// 只有所有字段完全相同的记录才视为重复
    pub async fn retrieve(
        &self,
        query: &MemoryRecord,
        include_durable: bool,
    ) -> Result<Vec<MemoryRecord>, AgentError> {
        self.require_conversation()?;
        let short = self.short_term.search(query).await;
        if !include_durable {
            return Ok(short);
        }
        let long = self.long_term.search(query).await;

        let mut seen = HashSet::new();
        let combined = short
            .into_iter()
            .chain(long)
            .filter(|record| seen.insert(record_identity(record)))
            .collect();
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ShortTermCache;
    use serde_json::json;
    use std::time::Duration;

    fn rec(v: Value) -> MemoryRecord {
        v.as_object().cloned().unwrap()
    }

    fn tiers() -> (Arc<ShortTermCache>, Arc<ShortTermCache>) {
        (
            Arc::new(ShortTermCache::new(100, Duration::from_secs(60))),
            Arc::new(ShortTermCache::new(100, Duration::from_secs(60))),
        )
    }

    #[tokio::test]
    async fn test_unbound_conversation_is_config_error() {
        let (s, l) = tiers();
        let facade = MemoryFacade::new(s, l);
        let err = facade.persist(&rec(json!({"timestamp": 1})), false).await.unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(facade.retrieve(&MemoryRecord::new(), true).await.is_err());
    }

    #[tokio::test]
    async fn test_persist_routes_tiers() {
        let (s, l) = tiers();
        let facade = MemoryFacade::new(s.clone(), l.clone()).bind("c1");
        let user = rec(json!({"conversation_id": "c1", "role": "user", "timestamp": 100}));
        assert!(facade.persist(&user, false).await.unwrap());
        assert!(s.load("c1:100").await.is_some());
        assert!(l.load("c1:100").await.is_none());

        let reply = rec(json!({"conversation_id": "c1", "role": "assistant", "timestamp": 101}));
        assert!(facade.persist(&reply, true).await.unwrap());
        assert!(s.load("c1:101").await.is_some());
        assert!(l.load("c1:101").await.is_some());

        assert!(facade.persist(&rec(json!({"role": "system"})), false).await.unwrap());
        assert!(s.load("c1:unknown").await.is_some());
    }

    #[tokio::test]
    async fn test_retrieve_dedups_identical_records_only() {
        let (s, l) = tiers();
        let facade = MemoryFacade::new(s.clone(), l.clone()).bind("c1");
        let same = rec(json!({"conversation_id": "c1", "content": "a", "timestamp": 1}));
        facade.persist(&same, true).await.unwrap();

        // 仅时间戳精度不同：两层各保留一条
        let short_version = rec(json!({"conversation_id": "c1", "content": "b", "timestamp": 2}));
        let long_version = rec(json!({"conversation_id": "c1", "content": "b", "timestamp": 2.0}));
        s.save("c1:2", &short_version).await;
        l.save("c1:2.0", &long_version).await;

        let query = rec(json!({"conversation_id": "c1"}));
        let short_only = facade.retrieve(&query, false).await.unwrap();
        assert_eq!(short_only.len(), 2);

        let all = facade.retrieve(&query, true).await.unwrap();
        assert_eq!(all, vec![same, short_version, long_version]);
    }
}
