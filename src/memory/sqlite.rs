//! SQLite 长期记忆后端
//!
//! 单表 `memory(id, data, created_at, updated_at)`，data 为 JSON 文本。
//! rusqlite 是同步接口，所有操作经 spawn_blocking 在阻塞线程池执行。
//! search 先用 json_extract 按字段粗筛，再在进程内做逐字段精确比较，
//! 保证与其它后端的匹配语义完全一致（数字类型、null 等）。

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use crate::memory::store::{record_matches, MemoryRecord, MemoryStore};

/// SQLite 后端
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件并建表
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程中持锁执行；任何失败（锁中毒、SQL 错误、任务 panic）都返回 Err
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("sqlite lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .with_context(|| format!("sqlite {op} task failed"))?
    }
}

fn decode(data: &str) -> Option<MemoryRecord> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// `$."field"` 形式的 JSON path，字段名中的引号需转义
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, key: &str, data: &MemoryRecord) -> bool {
        let key = key.to_string();
        let json = match serde_json::to_string(data) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "sqlite save: record not serializable");
                return false;
            }
        };
        let result = self
            .with_conn("save", move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let created: Option<String> = conn
                    .query_row(
                        "SELECT created_at FROM memory WHERE id = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                conn.execute(
                    "INSERT OR REPLACE INTO memory (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![key, json, created.unwrap_or_else(|| now.clone()), now],
                )?;
                Ok(())
            })
            .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "sqlite save failed");
                false
            }
        }
    }

    async fn load(&self, key: &str) -> Option<MemoryRecord> {
        let key = key.to_string();
        let result = self
            .with_conn("load", move |conn| {
                let data: Option<String> = conn
                    .query_row("SELECT data FROM memory WHERE id = ?1", params![key], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(data)
            })
            .await;
        match result {
            Ok(data) => data.as_deref().and_then(decode),
            Err(e) => {
                tracing::warn!(error = %e, "sqlite load failed");
                None
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = key.to_string();
        let result = self
            .with_conn("delete", move |conn| {
                Ok(conn.execute("DELETE FROM memory WHERE id = ?1", params![key])?)
            })
            .await;
        match result {
            Ok(affected) => affected > 0,
            Err(e) => {
                tracing::warn!(error = %e, "sqlite delete failed");
                false
            }
        }
    }

    async fn search(&self, query: &MemoryRecord) -> Vec<MemoryRecord> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<String> = Vec::new();
        for (field, value) in query {
            // NULL 在 SQL 中不等于自身，交给进程内比较
            if value.is_null() {
                continue;
            }
            let n = bindings.len();
            conditions.push(format!(
                "json_extract(data, ?{}) = json_extract(?{}, '$')",
                n + 1,
                n + 2
            ));
            bindings.push(json_path(field));
            bindings.push(value.to_string());
        }
        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        let sql = format!("SELECT data FROM memory WHERE {where_clause} ORDER BY rowid");

        let result = self
            .with_conn("search", move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(bindings.iter()), |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await;

        match result {
            Ok(rows) => rows
                .iter()
                .filter_map(|data| decode(data))
                .filter(|record| record_matches(record, query))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "sqlite search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> MemoryRecord {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = rec(json!({"conversation_id": "c1", "role": "user", "content": "hi", "timestamp": 100}));
        assert!(store.save("c1:100", &data).await);
        assert_eq!(store.load("c1:100").await, Some(data));
        assert!(store.delete("c1:100").await);
        assert!(!store.delete("c1:100").await);
        assert_eq!(store.load("c1:100").await, None);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save("k", &rec(json!({"content": "a"}))).await;
        store.save("k", &rec(json!({"content": "b"}))).await;
        let all = store.search(&MemoryRecord::new()).await;
        assert_eq!(all, vec![rec(json!({"content": "b"}))]);
    }

    #[tokio::test]
    async fn test_search_exact_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save("c1:1", &rec(json!({"conversation_id": "c1", "n": 1, "flag": true}))).await;
        store.save("c1:2", &rec(json!({"conversation_id": "c1", "n": 2, "flag": false}))).await;
        store.save("c2:1", &rec(json!({"conversation_id": "c2", "n": 1}))).await;

        assert_eq!(store.search(&rec(json!({"conversation_id": "c1"}))).await.len(), 2);
        assert_eq!(store.search(&rec(json!({"n": 1}))).await.len(), 2);
        assert_eq!(store.search(&rec(json!({"flag": true}))).await.len(), 1);
        assert!(store.search(&rec(json!({"conversation_id": "c3"}))).await.is_empty());
        // 1 与 1.0 不是同一个 JSON 值
        assert!(store.search(&rec(json!({"n": 1.0}))).await.is_empty());
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/memory.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            assert!(store.save("k", &rec(json!({"v": "kept"}))).await);
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load("k").await, Some(rec(json!({"v": "kept"}))));
    }
}
