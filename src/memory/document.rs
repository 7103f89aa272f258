//! JSON 文档长期记忆后端
//!
//! 整个存储是一个 `{key: record}` JSON 文件；启动时读入内存，
//! 每次变更后整体写回（先写临时文件再 rename）。适合单进程、中小规模数据。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::memory::store::{record_matches, MemoryRecord, MemoryStore};

/// 文档文件后端
pub struct JsonFileStore {
    path: PathBuf,
    documents: RwLock<BTreeMap<String, MemoryRecord>>,
}

impl JsonFileStore {
    /// 打开文档文件；文件不存在时从空集合开始，损坏时返回错误
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let documents = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            documents: RwLock::new(documents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, documents: &BTreeMap<String, MemoryRecord>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_string_pretty(documents)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    fn name(&self) -> &str {
        "document"
    }

    async fn save(&self, key: &str, data: &MemoryRecord) -> bool {
        let mut documents = self.documents.write().await;
        let previous = documents.insert(key.to_string(), data.clone());
        if let Err(e) = self.flush(&documents).await {
            tracing::warn!(error = %e, path = %self.path.display(), "document store save failed");
            // 回滚内存状态，保持与文件一致
            match previous {
                Some(old) => documents.insert(key.to_string(), old),
                None => documents.remove(key),
            };
            return false;
        }
        true
    }

    async fn load(&self, key: &str) -> Option<MemoryRecord> {
        self.documents.read().await.get(key).cloned()
    }

    async fn delete(&self, key: &str) -> bool {
        let mut documents = self.documents.write().await;
        let Some(old) = documents.remove(key) else {
            return false;
        };
        if let Err(e) = self.flush(&documents).await {
            tracing::warn!(error = %e, path = %self.path.display(), "document store delete failed");
            documents.insert(key.to_string(), old);
            return false;
        }
        true
    }

    async fn search(&self, query: &MemoryRecord) -> Vec<MemoryRecord> {
        self.documents
            .read()
            .await
            .values()
            .filter(|record| record_matches(record, query))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> MemoryRecord {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let data = rec(json!({"conversation_id": "c1", "role": "user", "content": "hi", "timestamp": 100}));
        {
            let store = JsonFileStore::open(&path).unwrap();
            assert!(store.save("c1:100", &data).await);
            assert_eq!(store.load("c1:100").await, Some(data.clone()));
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.load("c1:100").await, Some(data));
        assert!(store.delete("c1:100").await);
        assert!(!store.delete("c1:100").await);
        assert!(JsonFileStore::open(&path).unwrap().load("c1:100").await.is_none());
    }

    #[tokio::test]
    async fn test_search_matches_sqlite_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("m.json")).unwrap();
        store.save("c1:1", &rec(json!({"conversation_id": "c1", "n": 1}))).await;
        store.save("c2:1", &rec(json!({"conversation_id": "c2", "n": 1}))).await;
        assert_eq!(store.search(&rec(json!({"conversation_id": "c1"}))).await.len(), 1);
        assert_eq!(store.search(&rec(json!({"n": 1}))).await.len(), 2);
        assert!(store.search(&rec(json!({"n": 1.0}))).await.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_path_degrades_to_false() {
        let dir = tempfile::tempdir().unwrap();
        // 以已存在的文件作为父目录，写入必然失败
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = JsonFileStore::open(blocker.join("m.json")).unwrap();
        assert!(!store.save("k", &rec(json!({"v": 1}))).await);
        assert!(store.load("k").await.is_none());
    }
}
