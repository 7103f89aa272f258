//! 短期记忆：有界、带过期时间的键值缓存（LRU + TTL）
//!
//! - save：插入/覆盖并移到最新位置，随后先清理全部过期项，再按插入顺序淘汰最旧项直到不超过上限
//! - load：过期项惰性删除；命中时同时刷新位置与时间戳（读即 touch）
//! - search：跳过过期项但不在扫描中清理
//!
//! 每次写入的代价是 O(过期数 + 溢出数) 外加一次全表过期扫描，不是 O(1)。
//! 临界区由 Mutex 串行化，多个并发任务共享同一实例是安全的。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::memory::store::{record_matches, MemoryRecord, MemoryStore};

struct Entry {
    data: MemoryRecord,
    stamped: Instant,
    seq: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Entry>,
    /// seq -> key，按插入/访问先后排序；最小 seq 即最旧
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.seq);
            entry.seq = seq;
            entry.stamped = now;
            self.order.insert(seq, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }
}

/// 短期缓存
pub struct ShortTermCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    expiration: Duration,
}

impl ShortTermCache {
    pub fn new(max_size: usize, expiration: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_size,
            expiration,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前键，按从旧到新的顺序
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // 中毒只意味着另一个写者 panic 过，缓存结构本身仍然一致
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, stamped: Instant, now: Instant) -> bool {
        now.saturating_duration_since(stamped) >= self.expiration
    }

    fn evict_if_needed(&self, inner: &mut CacheInner, now: Instant) {
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| self.is_expired(e.stamped, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "short-term cache purged expired entries");
        }

        while inner.entries.len() > self.max_size {
            let Some((_, oldest)) = inner.order.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::debug!(key = %oldest, "short-term cache evicted oldest entry");
        }
    }
}

#[async_trait]
impl MemoryStore for ShortTermCache {
    fn name(&self) -> &str {
        "short-term"
    }

    async fn save(&self, key: &str, data: &MemoryRecord) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.remove(key);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            Entry {
                data: data.clone(),
                stamped: now,
                seq,
            },
        );
        inner.order.insert(seq, key.to_string());
        self.evict_if_needed(&mut inner, now);
        true
    }

    async fn load(&self, key: &str) -> Option<MemoryRecord> {
        let now = Instant::now();
        let mut inner = self.lock();
        let stamped = inner.entries.get(key)?.stamped;
        if self.is_expired(stamped, now) {
            inner.remove(key);
            return None;
        }
        inner.touch(key, now);
        inner.entries.get(key).map(|e| e.data.clone())
    }

    async fn delete(&self, key: &str) -> bool {
        self.lock().remove(key);
        true
    }

    async fn search(&self, query: &MemoryRecord) -> Vec<MemoryRecord> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .order
            .values()
            .filter_map(|key| inner.entries.get(key))
            .filter(|e| !self.is_expired(e.stamped, now))
            .filter(|e| record_matches(&e.data, query))
            .map(|e| e.data.clone())
            .collect()
    }
}
