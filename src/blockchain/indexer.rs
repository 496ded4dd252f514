use std::sync::Arc;

use log::{debug, info};

use super::classifier::{classify, TxKind};
use super::fetcher::LedgerClient;
use crate::database::schema::{self, ACCOUNT_ORDER, TRANSACTIONS_ORDER};
use crate::database::{IndexBatch, IndexStore};
use crate::error::{IndexerError, Result};
use crate::metrics::{TOKEN_TRANSFERS, TXS_INDEXED};
use crate::models::{BlockRecord, BlockSummary, RpcBlock, RpcTransaction, TransactionRecord};
use crate::utils::{quantity_to_decimal, quantity_to_u64};

// Turns one queued block number into a committed set of index entries
pub struct BlockProcessor<L, S> {
    ledger: Arc<L>,
    store: Arc<S>,
}

impl<L, S> Clone for BlockProcessor<L, S> {
    fn clone(&self) -> Self {
        BlockProcessor {
            ledger: Arc::clone(&self.ledger),
            store: Arc::clone(&self.store),
        }
    }
}

impl<L: LedgerClient, S: IndexStore> BlockProcessor<L, S> {
    pub fn new(ledger: Arc<L>, store: Arc<S>) -> Self {
        BlockProcessor { ledger, store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // Fetches, decodes and commits one block. Nothing is written unless every
    // fetch succeeded; on error the block stays pending.
    pub async fn process(&self, member: &str) -> Result<BlockSummary> {
        // Queue members are decimal block numbers
        let number: u64 = member
            .trim()
            .parse()
            .map_err(|_| IndexerError::InvalidBlockNumber(member.to_string()))?;

        // Records may only follow an existing queue entry
        if self.store.queue_score(member).await?.is_none() {
            return Err(IndexerError::NotQueued(member.to_string()));
        }

        // Fetch the block and make sure the node answered for the right height
        let block = self.ledger.get_block_by_number(number).await?;
        let fetched_number = quantity_to_u64(&block.number)?;
        if fetched_number != number {
            return Err(IndexerError::Inconsistent(format!(
                "requested block {} but ledger returned {}",
                number, fetched_number
            )));
        }

        // Sequential to keep ledger order and bound per-worker load
        let mut txs = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            txs.push(self.ledger.get_transaction_by_hash(tx.hash()).await?);
        }

        // Commit the index first; the done mark only follows a clean commit
        let (batch, summary) = build_batch(&block, &txs)?;
        self.store.commit(&batch).await?;
        self.store.mark_done(member).await?;

        // Update metrics
        TXS_INDEXED.inc_by(summary.tx_count as f64);
        TOKEN_TRANSFERS.inc_by(summary.token_transfers as f64);
        Ok(summary)
    }
}

// Builds every index mutation for a fetched block. The done mark is not part
// of the batch.
pub fn build_batch(block: &RpcBlock, txs: &[RpcTransaction]) -> Result<(IndexBatch, BlockSummary)> {
    let number = quantity_to_u64(&block.number)?;
    let timestamp = quantity_to_u64(&block.timestamp)? as f64;
    let mut batch = IndexBatch::new();

    // Global order by block timestamp
    for tx in txs {
        batch.zadd(TRANSACTIONS_ORDER, timestamp, tx.hash.as_str());
    }

    // Block detail
    let record = block_record(block)?;
    batch.hset(schema::block_detail(number), record.fields());

    // Per-transaction entries, in ledger order
    let mut token_transfers = 0;
    for (position, tx) in txs.iter().enumerate() {
        if index_transaction(&mut batch, number, position, tx)? {
            token_transfers += 1;
        }
    }

    Ok((
        batch,
        BlockSummary {
            number,
            tx_count: txs.len(),
            token_transfers,
        },
    ))
}

pub fn block_record(block: &RpcBlock) -> Result<BlockRecord> {
    // Prefer the author, falling back to the miner
    let validator = [&block.author, &block.miner]
        .into_iter()
        .flatten()
        .find(|addr| !addr.is_empty())
        .cloned()
        .unwrap_or_default();

    Ok(BlockRecord {
        hash: block.hash.clone(),
        validator,
        gas_used: quantity_to_decimal(&block.gas_used)?,
        size: block
            .size
            .as_deref()
            .map(quantity_to_decimal)
            .transpose()?
            .unwrap_or_else(|| "0".to_string()),
        timestamp: quantity_to_decimal(&block.timestamp)?,
        number: quantity_to_decimal(&block.number)?,
    })
}

pub fn transaction_record(tx: &RpcTransaction, number: u64) -> Result<TransactionRecord> {
    // A transaction must belong to the block it was listed in
    let tx_block = tx
        .block_number
        .as_deref()
        .map(quantity_to_u64)
        .transpose()?;
    if tx_block != Some(number) {
        return Err(IndexerError::Inconsistent(format!(
            "transaction {} reports block {:?}, expected {}",
            tx.hash, tx_block, number
        )));
    }

    // Quantities are stored as decimal strings
    Ok(TransactionRecord {
        from: tx.from.clone(),
        to: tx.to_address().to_string(),
        value: quantity_to_decimal(&tx.value)?,
        gas: quantity_to_decimal(&tx.gas)?,
        gas_price: tx
            .gas_price
            .as_deref()
            .map(quantity_to_decimal)
            .transpose()?
            .unwrap_or_else(|| "0".to_string()),
        hash: tx.hash.clone(),
        input: tx.input.clone(),
        nonce: quantity_to_decimal(&tx.nonce)?,
        block_number: number.to_string(),
    })
}

// Adds one transaction's entries; returns whether it was a token transfer
fn index_transaction(
    batch: &mut IndexBatch,
    number: u64,
    position: usize,
    tx: &RpcTransaction,
) -> Result<bool> {
    let record = transaction_record(tx, number)?;
    let hash = record.hash.as_str();

    // Detail, position in the block, and the sender as first participant
    batch.hset(schema::tx_detail(number, hash), record.fields());
    batch.zadd(schema::block_tx_list(number), position as f64, hash);
    batch.zadd(schema::tx_accounts(number, hash), 0.0, record.from.as_str());

    // Classify the call data
    let kind = classify(&record.input, &record.to);
    debug!("Transaction {} in block {} is {}", hash, number, kind.as_str());
    if let TxKind::TokenTransfer(transfer) = &kind {
        info!(
            "Token transaction in count {} to address {} (contract {}, hash {})",
            transfer.amount, transfer.to, record.to, hash
        );
        batch.hset(
            schema::tx_transfer(number, hash),
            vec![
                ("contract".to_string(), record.to.clone()),
                ("to".to_string(), transfer.to.clone()),
                ("amount".to_string(), transfer.amount.to_string()),
            ],
        );
    }

    // Contract creation has no recipient side
    if !record.to.is_empty() {
        batch.zadd(schema::tx_accounts(number, hash), 1.0, record.to.as_str());
        index_account(batch, &record.to, hash, number);
    }
    index_account(batch, &record.from, hash, number);

    Ok(matches!(kind, TxKind::TokenTransfer(_)))
}

fn index_account(batch: &mut IndexBatch, address: &str, hash: &str, number: u64) {
    // Account history, scored by block number
    batch.zadd(schema::account_tx_list(address), number as f64, hash);
    // Blocks finish out of order; keep the latest block that touched the account
    batch.zadd_max(ACCOUNT_ORDER, number as f64, address);
}
