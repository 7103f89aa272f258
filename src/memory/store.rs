//! 记忆存储契约：save / load / delete / search 四个操作
//!
//! 短期缓存与两种长期后端都实现 MemoryStore；任何后端故障都只能降级为
//! `false` / `None` / 空列表，不允许把错误抛出存储边界。

use async_trait::async_trait;
use serde_json::{Map, Value};

/// 记忆记录：任意字段映射
pub type MemoryRecord = Map<String, Value>;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &str;

    async fn save(&self, key: &str, data: &MemoryRecord) -> bool;

    async fn load(&self, key: &str) -> Option<MemoryRecord>;

    async fn delete(&self, key: &str) -> bool;

    /// 返回所有字段与 query 逐一精确相等的记录（不分页、无索引）
    async fn search(&self, query: &MemoryRecord) -> Vec<MemoryRecord>;
}

/// record 是否包含 query 的全部字段且值完全相等
pub fn record_matches(record: &MemoryRecord, query: &MemoryRecord) -> bool {
    query
        .iter()
        .all(|(k, v)| record.get(k).is_some_and(|actual| actual == v))
}

/// 记录的规范化身份：字段按键排序后序列化，用于跨层精确去重
pub fn record_identity(record: &MemoryRecord) -> String {
    let sorted: std::collections::BTreeMap<&String, &Value> = record.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> MemoryRecord {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_superset_match() {
        let record = rec(json!({"conversation_id": "c1", "role": "user", "timestamp": 1}));
        assert!(record_matches(&record, &rec(json!({"conversation_id": "c1"}))));
        assert!(record_matches(&record, &rec(json!({}))));
        assert!(!record_matches(&record, &rec(json!({"conversation_id": "c2"}))));
        assert!(!record_matches(&record, &rec(json!({"missing": null}))));
    }

    #[test]
    fn test_identity_ignores_field_order() {
        let a = rec(json!({"a": 1, "b": "x"}));
        let mut b = MemoryRecord::new();
        b.insert("b".into(), json!("x"));
        b.insert("a".into(), json!(1));
        assert_eq!(record_identity(&a), record_identity(&b));
        assert_ne!(record_identity(&a), record_identity(&rec(json!({"a": 1.0, "b": "x"}))));
    }
}
