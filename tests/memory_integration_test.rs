//! 记忆层集成测试：两种长期存储后端与双层门面

use std::sync::Arc;
use std::time::Duration;

use concierge::memory::{
    JsonFileStore, MemoryFacade, MemoryRecord, MemoryStore, ShortTermCache, SqliteStore,
};
use serde_json::{json, Value};

fn rec(v: Value) -> MemoryRecord {
    v.as_object().cloned().unwrap()
}

fn hi_record() -> MemoryRecord {
    rec(json!({"conversation_id": "c1", "role": "user", "content": "hi", "timestamp": 100}))
}

async fn assert_contract(store: &dyn MemoryStore) {
    assert!(store.save("c1:100", &hi_record()).await);
    assert_eq!(store.load("c1:100").await, Some(hi_record()));

    // 同一时间戳的第二次写入覆盖第一次
    let second = rec(json!({"conversation_id": "c1", "role": "user", "content": "again", "timestamp": 100}));
    assert!(store.save("c1:100", &second).await);
    assert_eq!(store.load("c1:100").await.unwrap()["content"], "again");

    let other = rec(json!({"conversation_id": "c2", "role": "assistant", "content": "x", "timestamp": 101}));
    assert!(store.save("c2:101", &other).await);
    let found = store.search(&rec(json!({"conversation_id": "c1"}))).await;
    assert_eq!(found, vec![second]);

    assert!(store.delete("c2:101").await);
    assert_eq!(store.load("c2:101").await, None);
}

#[tokio::test]
async fn test_every_backend_honours_the_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ShortTermCache::new(10, Duration::from_secs(60));
    let sqlite = SqliteStore::open(dir.path().join("memory.db")).unwrap();
    let document = JsonFileStore::open(dir.path().join("memory.json")).unwrap();

    assert_contract(&cache).await;
    assert_contract(&sqlite).await;
    assert_contract(&document).await;
}

#[tokio::test]
async fn test_durable_backends_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("memory.db");
    let doc = dir.path().join("memory.json");
    {
        let sqlite = SqliteStore::open(&db).unwrap();
        let document = JsonFileStore::open(&doc).unwrap();
        assert!(sqlite.save("c1:100", &hi_record()).await);
        assert!(document.save("c1:100", &hi_record()).await);
    }
    let sqlite = SqliteStore::open(&db).unwrap();
    let document = JsonFileStore::open(&doc).unwrap();
    assert_eq!(sqlite.load("c1:100").await, Some(hi_record()));
    assert_eq!(document.load("c1:100").await, Some(hi_record()));
}

#[tokio::test]
async fn test_facade_dedups_identical_records_only() {
    let dir = tempfile::tempdir().unwrap();
    let short: Arc<dyn MemoryStore> = Arc::new(ShortTermCache::new(10, Duration::from_secs(60)));
    let long: Arc<dyn MemoryStore> = Arc::new(SqliteStore::open(dir.path().join("m.db")).unwrap());
    let facade = MemoryFacade::new(short, long.clone()).bind("c1");

    assert!(facade.persist(&hi_record(), true).await.unwrap());
    // 只差一个字段（时间戳）的记录不算重复
    let drifted = rec(json!({"conversation_id": "c1", "role": "user", "content": "hi", "timestamp": 100.5}));
    assert!(long.save("c1:100.5", &drifted).await);

    let query = rec(json!({"conversation_id": "c1"}));
    let merged = facade.retrieve(&query, true).await.unwrap();
    assert_eq!(merged, vec![hi_record(), drifted]);

    let short_only = facade.retrieve(&query, false).await.unwrap();
    assert_eq!(short_only, vec![hi_record()]);
}
