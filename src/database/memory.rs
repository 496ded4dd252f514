use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::schema::{DONE, PENDING, QUEUE_BLOCKS, QUEUE_DEAD};
use super::store::{unix_now, IndexBatch, IndexStore, Mutation};
use crate::error::{IndexerError, Result};

#[derive(Default)]
struct Tables {
    hashes: HashMap<String, HashMap<String, String>>,
    // Kept sorted by (score, member), the order Redis uses
    zsets: HashMap<String, Vec<(f64, String)>>,
}

impl Tables {
    fn zadd(&mut self, key: &str, score: f64, member: &str) {
        let set = self.zsets.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m != member);
        let pos = set
            .iter()
            .position(|(s, m)| (*s, m.as_str()) > (score, member))
            .unwrap_or(set.len());
        set.insert(pos, (score, member.to_string()));
    }

    fn zrem(&mut self, key: &str, member: &str) {
        if let Some(set) = self.zsets.get_mut(key) {
            set.retain(|(_, m)| m != member);
        }
    }

    // Writing a hash over a sorted set, or the reverse, fails like Redis WRONGTYPE
    fn check_type(&self, key: &str, hash: bool) -> Result<()> {
        let conflict = if hash {
            self.zsets.get(key).is_some_and(|set| !set.is_empty())
        } else {
            self.hashes.contains_key(key)
        };
        if conflict {
            return Err(IndexerError::Store(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "WRONGTYPE Operation against a key holding the wrong kind of value",
                key.to_string(),
            ))));
        }
        Ok(())
    }

    fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Hash { key, fields } => {
                self.check_type(key, true)?;
                let hash = self.hashes.entry(key.clone()).or_default();
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
            }
            Mutation::ZAdd { key, score, member } => {
                self.check_type(key, false)?;
                self.zadd(key, *score, member);
            }
            Mutation::ZAddMax { key, score, member } => {
                self.check_type(key, false)?;
                let current = self
                    .zsets
                    .get(key)
                    .and_then(|set| set.iter().find(|(_, m)| m == member))
                    .map(|(s, _)| *s);
                if current.map_or(true, |s| *score > s) {
                    self.zadd(key, *score, member);
                }
            }
        }
        Ok(())
    }
}

// In-process index store with the same semantics as the Redis one
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Makes every following commit fail without applying anything
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn mark_pending(&self, member: &str) {
        self.lock().zadd(QUEUE_BLOCKS, PENDING, member);
    }

    pub fn hash(&self, key: &str) -> Option<HashMap<String, String>> {
        self.lock().hashes.get(key).cloned()
    }

    // Members of a sorted set in ascending (score, member) order
    pub fn range(&self, key: &str) -> Vec<String> {
        self.lock()
            .zsets
            .get(key)
            .map(|set| set.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    pub fn score(&self, key: &str, member: &str) -> Option<f64> {
        self.lock()
            .zsets
            .get(key)
            .and_then(|set| set.iter().find(|(_, m)| m == member).map(|(s, _)| *s))
    }

    // Every key currently holding data, sorted
    pub fn keys(&self) -> Vec<String> {
        let tables = self.lock();
        let mut keys: Vec<String> = tables
            .hashes
            .keys()
            .chain(tables.zsets.keys().filter(|k| !tables.zsets[*k].is_empty()))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panicking test thread must not wedge the others
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64> {
        let tables = self.lock();
        Ok(tables
            .zsets
            .get(QUEUE_BLOCKS)
            .map(|set| set.iter().filter(|(s, _)| *s == PENDING).count() as u64)
            .unwrap_or(0))
    }

    async fn pending_blocks(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        let tables = self.lock();
        Ok(tables
            .zsets
            .get(QUEUE_BLOCKS)
            .map(|set| {
                set.iter()
                    .filter(|(s, _)| *s == PENDING)
                    .skip(offset)
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: &IndexBatch) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(IndexerError::StoreUnavailable("injected commit failure".to_string()));
        }
        let mut tables = self.lock();
        // Like EXEC, a failing command does not stop the ones after it
        let mut first_error = None;
        for mutation in &batch.mutations {
            if let Err(e) = tables.apply(mutation) {
                first_error.get_or_insert(e);
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        first_error.map_or(Ok(()), Err)
    }

    async fn queue_score(&self, member: &str) -> Result<Option<f64>> {
        Ok(self.score(QUEUE_BLOCKS, member))
    }

    async fn mark_done(&self, member: &str) -> Result<()> {
        self.lock().zadd(QUEUE_BLOCKS, DONE, member);
        Ok(())
    }

    async fn dead_letter(&self, member: &str, _reason: &str) -> Result<()> {
        let mut tables = self.lock();
        tables.zadd(QUEUE_DEAD, unix_now(), member);
        tables.zrem(QUEUE_BLOCKS, member);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_members_follow_score_then_member_order() {
        let store = MemoryStore::new();
        for member in ["12", "10", "11"] {
            store.mark_pending(member);
        }
        store.mark_done("10").await.unwrap();

        assert_eq!(store.pending_count().await.unwrap(), 2);
        assert_eq!(store.pending_blocks(0, 1).await.unwrap(), vec!["11"]);
        assert_eq!(store.pending_blocks(1, 5).await.unwrap(), vec!["12"]);
        assert!(store.pending_blocks(2, 5).await.unwrap().is_empty());
        assert_eq!(store.range(QUEUE_BLOCKS), vec!["11", "12", "10"]);
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_commits(true);
        let mut batch = IndexBatch::new();
        batch.hset("block:1:detail", vec![("hash".to_string(), "0x1".to_string())]);
        assert!(store.commit(&batch).await.is_err());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn type_conflict_fails_commit_but_applies_the_rest() {
        let store = MemoryStore::new();
        let mut seed = IndexBatch::new();
        seed.hset("block:1:tx_list", vec![("x".to_string(), "y".to_string())]);
        store.commit(&seed).await.unwrap();

        let mut batch = IndexBatch::new();
        batch.zadd("block:1:tx_list", 0.0, "0xaa01");
        batch.zadd("transactions:order", 5.0, "0xaa01");
        let err = store.commit(&batch).await.unwrap_err();

        assert!(matches!(err, IndexerError::Store(_)));
        assert_eq!(store.score("transactions:order", "0xaa01"), Some(5.0));
        assert!(store.range("block:1:tx_list").is_empty());
    }
}
