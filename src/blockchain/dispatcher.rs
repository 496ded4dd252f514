use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::fetcher::LedgerClient;
use super::indexer::BlockProcessor;
use crate::config::Config;
use crate::database::IndexStore;
use crate::error::Result;
use crate::metrics::{
    BLOCKS_DEAD_LETTERED, BLOCKS_INDEXED, BLOCK_FAILURES, BLOCK_PROCESS_TIME, QUEUE_PENDING,
};
use crate::models::BlockSummary;

// One queued block handed to a worker. The worker reports through `done`
// whether the block left the queue; the dispatcher's receiver closes once
// every job of the cycle has been dropped.
#[derive(Debug)]
pub struct Job {
    pub member: String,
    done: mpsc::UnboundedSender<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cycle {
    pub dispatched: usize,
    // Blocks indexed or dead-lettered
    pub completed: usize,
    // Blocks left pending after an error
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Indexed(BlockSummary),
    // Left pending for a later cycle
    Failed,
    DeadLettered,
}

// Polls the work queue and feeds the worker pool
pub struct Dispatcher<L, S> {
    processor: BlockProcessor<L, S>,
    workers: usize,
    batch_limit: usize,
    idle_poll_interval: Duration,
    // Pending members to skip: those that failed in earlier cycles
    cursor: usize,
}

impl<L, S> Dispatcher<L, S>
where
    L: LedgerClient + 'static,
    S: IndexStore + 'static,
{
    pub fn new(processor: BlockProcessor<L, S>, config: &Config) -> Self {
        Self::with_limits(
            processor,
            config.workers,
            config.batch_limit,
            config.idle_poll_interval,
        )
    }

    pub fn with_limits(
        processor: BlockProcessor<L, S>,
        workers: usize,
        batch_limit: usize,
        idle_poll_interval: Duration,
    ) -> Self {
        Dispatcher {
            processor,
            workers: workers.max(1),
            batch_limit: batch_limit.max(1),
            idle_poll_interval,
            cursor: 0,
        }
    }

    // Runs until cancelled, then waits for workers to finish their current block
    pub async fn run(mut self, cancel: CancellationToken) {
        let (tx, rx) = mpsc::channel(self.workers);
        let pool = WorkerPool::spawn(self.workers, self.processor.clone(), rx, cancel.clone());
        info!("Started {} block workers", self.workers);

        while !cancel.is_cancelled() {
            if tx.is_closed() {
                error!("All workers exited; stopping dispatcher");
                break;
            }
            match self.cycle(&tx, &cancel).await {
                // Nothing to do, or only blocks that keep failing
                Ok(cycle) if cycle.completed == 0 => self.idle(&cancel).await,
                Ok(cycle) => debug!(
                    "Cycle finished: {} of {} blocks completed, {} failed",
                    cycle.completed, cycle.dispatched, cycle.failed
                ),
                Err(e) => {
                    warn!("Error polling work queue: {}. Retrying...", e);
                    self.idle(&cancel).await;
                }
            }
        }

        drop(tx);
        pool.join().await;
        info!("Dispatcher stopped");
    }

    // One poll of the queue. Returns once every dispatched block has been
    // processed, or on cancellation.
    //
    // Failed blocks stay at the front of the pending set, so the window moves
    // past them and wraps to the front once it runs off the end. A run of
    // failing blocks longer than the batch limit cannot starve the rest.
    pub async fn cycle(&mut self, tx: &mpsc::Sender<Job>, cancel: &CancellationToken) -> Result<Cycle> {
        let store = Arc::clone(self.processor.store());
        let pending = store.pending_count().await?;
        QUEUE_PENDING.set(pending as f64);
        if pending == 0 {
            self.cursor = 0;
            return Ok(Cycle::default());
        }

        // Window exhausted: retry from the front
        if self.cursor as u64 >= pending {
            debug!("Pending window wrapped after skipping {} blocks", self.cursor);
            self.cursor = 0;
        }
        let members = store.pending_blocks(self.cursor, self.batch_limit).await?;
        info!(
            "Dispatching {} of {} pending blocks (skipping {})",
            members.len(),
            pending,
            self.cursor
        );

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut cycle = Cycle::default();
        // Hand each member to the pool; send waits while every worker is busy
        for member in members {
            let job = Job {
                member,
                done: done_tx.clone(),
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                res = tx.send(job) => {
                    if res.is_err() {
                        break;
                    }
                    cycle.dispatched += 1;
                }
            }
        }

        // Workers hold the remaining senders; the channel closes when all jobs are dropped
        drop(done_tx);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                report = done_rx.recv() => match report {
                    Some(true) => cycle.completed += 1,
                    Some(false) => cycle.failed += 1,
                    None => break,
                },
            }
        }

        // Completed members left the pending set; failed ones now sit before the cursor
        self.cursor += cycle.failed;
        Ok(cycle)
    }

    async fn idle(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.idle_poll_interval) => {}
        }
    }
}

// Fixed set of tasks sharing the receive end of the work channel
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<L, S>(
        size: usize,
        processor: BlockProcessor<L, S>,
        rx: mpsc::Receiver<Job>,
        cancel: CancellationToken,
    ) -> Self
    where
        L: LedgerClient + 'static,
        S: IndexStore + 'static,
    {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..size)
            .map(|id| {
                tokio::spawn(worker(id, processor.clone(), Arc::clone(&rx), cancel.clone()))
            })
            .collect();
        WorkerPool { handles }
    }

    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked: {}", e);
            }
        }
    }
}

async fn worker<L, S>(
    id: usize,
    processor: BlockProcessor<L, S>,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    cancel: CancellationToken,
) where
    L: LedgerClient,
    S: IndexStore,
{
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => None,
            job = async { rx.lock().await.recv().await } => job,
        };
        let Some(job) = job else { break };
        let outcome = handle_block(&processor, &job.member).await;
        // The dispatcher may have stopped listening on shutdown
        let _ = job.done.send(outcome != BlockOutcome::Failed);
    }
    debug!("Worker {} exiting", id);
}

// Processes one queue member and records its outcome; errors never escape
pub async fn handle_block<L, S>(processor: &BlockProcessor<L, S>, member: &str) -> BlockOutcome
where
    L: LedgerClient,
    S: IndexStore,
{
    // Start timer
    let start_time = Instant::now();
    match processor.process(member).await {
        Ok(summary) => {
            // Update metrics
            let elapsed = start_time.elapsed();
            BLOCK_PROCESS_TIME.observe(elapsed.as_secs_f64());
            BLOCKS_INDEXED.inc();
            info!(
                "Indexed block {} with {} transactions in {:.2}s",
                summary.number,
                summary.tx_count,
                elapsed.as_secs_f64()
            );
            BlockOutcome::Indexed(summary)
        }
        Err(e) if e.is_poison() => {
            error!("Dropping queue member {:?}: {}", member, e);
            match processor.store().dead_letter(member, &e.to_string()).await {
                Ok(()) => {
                    BLOCKS_DEAD_LETTERED.inc();
                    BlockOutcome::DeadLettered
                }
                Err(store_err) => {
                    warn!("Failed to dead-letter {:?}: {}", member, store_err);
                    BLOCK_FAILURES.inc();
                    BlockOutcome::Failed
                }
            }
        }
        Err(e) => {
            warn!("Error processing block {}: {}. Left pending", member, e);
            BLOCK_FAILURES.inc();
            BlockOutcome::Failed
        }
    }
}
