use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::schema::{DONE, PENDING, QUEUE_BLOCKS, QUEUE_DEAD};
use crate::error::{IndexerError, Result};

// A single write against the index
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Hash { key: String, fields: Vec<(String, String)> },
    ZAdd { key: String, score: f64, member: String },
    // Only ever raises an existing member's score
    ZAddMax { key: String, score: f64, member: String },
}

// Ordered set of mutations committed together for one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexBatch {
    pub mutations: Vec<Mutation>,
}

impl IndexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hset(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.mutations.push(Mutation::Hash { key: key.into(), fields });
        self
    }

    pub fn zadd(&mut self, key: impl Into<String>, score: f64, member: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::ZAdd {
            key: key.into(),
            score,
            member: member.into(),
        });
        self
    }

    pub fn zadd_max(&mut self, key: impl Into<String>, score: f64, member: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::ZAddMax {
            key: key.into(),
            score,
            member: member.into(),
        });
        self
    }
}

// Storage backend for the work queue and the index
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // Number of queue members still marked pending
    async fn pending_count(&self) -> Result<u64>;

    // Up to `limit` pending members after skipping `offset`, in the store's
    // (score, member) order
    async fn pending_blocks(&self, offset: usize, limit: usize) -> Result<Vec<String>>;

    // Queue score of a member, or None if it was never enqueued
    async fn queue_score(&self, member: &str) -> Result<Option<f64>>;

    // Applies the batch in one isolated transaction. A command failing inside
    // it does not roll back the others, so a failed commit may leave part of
    // the batch applied. Entries are idempotent; the block stays pending and
    // the retry overwrites them.
    async fn commit(&self, batch: &IndexBatch) -> Result<()>;

    // Flips a member to done. Only called once its batch committed cleanly.
    async fn mark_done(&self, member: &str) -> Result<()>;

    // Moves an unprocessable queue member out of the pending set
    async fn dead_letter(&self, member: &str, reason: &str) -> Result<()>;
}

pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as f64)
        .unwrap_or_default()
}

// Translates a batch into one MULTI/EXEC pipeline, mutations in batch order
pub(crate) fn commit_pipeline(batch: &IndexBatch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for mutation in &batch.mutations {
        match mutation {
            Mutation::Hash { key, fields } => {
                pipe.hset_multiple(key, fields.as_slice()).ignore();
            }
            Mutation::ZAdd { key, score, member } => {
                pipe.zadd(key, member, *score).ignore();
            }
            // GT: never lowers an existing score
            Mutation::ZAddMax { key, score, member } => {
                pipe.cmd("ZADD").arg(key).arg("GT").arg(*score).arg(member).ignore();
            }
        }
    }
    pipe
}

// Redis-backed index store shared by all workers
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        // The manager reconnects on its own after a dropped connection
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| IndexerError::Timeout("store connect"))??;
        info!("Connected to index store at {}", url);
        Ok(RedisStore { conn, timeout })
    }

    // Bounds a single store call by the configured timeout
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| IndexerError::Timeout(op))?
            .map_err(IndexerError::from)
    }
}

#[async_trait]
impl IndexStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .timed("store ping", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.timed("pending count", conn.zcount(QUEUE_BLOCKS, PENDING, PENDING))
            .await
    }

    async fn pending_blocks(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.timed(
            "pending range",
            conn.zrangebyscore_limit(QUEUE_BLOCKS, PENDING, PENDING, offset as isize, limit as isize),
        )
        .await
    }

    async fn queue_score(&self, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        self.timed("queue score", conn.zscore(QUEUE_BLOCKS, member)).await
    }

    async fn commit(&self, batch: &IndexBatch) -> Result<()> {
        let pipe = commit_pipeline(batch);
        let mut conn = self.conn.clone();
        // EXEC replies carrying any per-command error come back as Err
        self.timed("batch commit", pipe.query_async(&mut conn)).await
    }

    async fn mark_done(&self, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = self
            .timed("done mark", conn.zadd(QUEUE_BLOCKS, member, DONE))
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, member: &str, reason: &str) -> Result<()> {
        // Add and remove together so the member is never lost or duplicated
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zadd(QUEUE_DEAD, member, unix_now())
            .ignore()
            .zrem(QUEUE_BLOCKS, member)
            .ignore();
        let mut conn = self.conn.clone();
        let _: () = self.timed("dead letter", pipe.query_async(&mut conn)).await?;
        info!("Moved {:?} to {}: {}", member, QUEUE_DEAD, reason);
        Ok(())
    }
}
