#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethbus::blockchain::{BlockProcessor, LedgerClient};
use ethbus::database::MemoryStore;
use ethbus::error::{IndexerError, Result};
use ethbus::models::{BlockTransaction, RpcBlock, RpcTransaction};

pub const SENDER: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";
pub const TOKEN: &str = "0xadfe00d92e5a16e773891f59780e6e54f40b532e";

// Scripted ledger with per-call failure injection
#[derive(Default)]
pub struct FakeLedger {
    blocks: Mutex<HashMap<u64, RpcBlock>>,
    txs: Mutex<HashMap<String, RpcTransaction>>,
    failing_txs: Mutex<HashSet<String>>,
    pub tx_fetches: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // Registers a block whose transactions are listed by hash only
    pub fn add_block(&self, number: u64, timestamp: u64, txs: Vec<RpcTransaction>) {
        let block = RpcBlock {
            number: format!("{:#x}", number),
            hash: format!("0xb10c{:060x}", number),
            author: Some(String::new()),
            miner: Some("0x00000000000000000000000000000000000000aa".to_string()),
            gas_used: "0x5208".to_string(),
            size: Some("0x220".to_string()),
            timestamp: format!("{:#x}", timestamp),
            transactions: txs
                .iter()
                .map(|tx| BlockTransaction::Hash(tx.hash.clone()))
                .collect(),
        };
        self.blocks.lock().unwrap().insert(number, block);
        let mut stored = self.txs.lock().unwrap();
        for tx in txs {
            stored.insert(tx.hash.clone(), tx);
        }
    }

    pub fn fail_transaction(&self, hash: &str, fail: bool) {
        let mut failing = self.failing_txs.lock().unwrap();
        if fail {
            failing.insert(hash.to_string());
        } else {
            failing.remove(hash);
        }
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn get_block_by_number(&self, number: u64) -> Result<RpcBlock> {
        self.blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or(IndexerError::MissingBlock(number))
    }

    async fn get_transaction_by_hash(&self, hash: &str) -> Result<RpcTransaction> {
        self.tx_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_txs.lock().unwrap().contains(hash) {
            return Err(IndexerError::Timeout("ledger request"));
        }
        self.txs
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| IndexerError::MissingTransaction(hash.to_string()))
    }

    async fn client_version(&self) -> Result<String> {
        Ok("fake/v1".to_string())
    }
}

pub fn tx(hash: &str, block: u64, from: &str, to: Option<&str>, input: &str) -> RpcTransaction {
    RpcTransaction {
        hash: hash.to_string(),
        from: from.to_string(),
        to: to.map(str::to_string),
        value: "0xde0b6b3a7640000".to_string(),
        gas: "0x5208".to_string(),
        gas_price: Some("0x3b9aca00".to_string()),
        nonce: "0x2a".to_string(),
        block_number: Some(format!("{:#x}", block)),
        input: input.to_string(),
    }
}

pub fn transfer_input(to: &str, amount_hex: &str) -> String {
    format!(
        "0xa9059cbb{:0>64}{:0>64}",
        to.trim_start_matches("0x"),
        amount_hex
    )
}

pub fn setup() -> (Arc<FakeLedger>, Arc<MemoryStore>, BlockProcessor<FakeLedger, MemoryStore>) {
    let ledger = Arc::new(FakeLedger::new());
    let store = Arc::new(MemoryStore::new());
    let processor = BlockProcessor::new(Arc::clone(&ledger), Arc::clone(&store));
    (ledger, store, processor)
}

// Full dump of the store's contents, for comparing end states
pub fn snapshot(store: &MemoryStore) -> Vec<String> {
    store
        .keys()
        .into_iter()
        .map(|key| match store.hash(&key) {
            Some(hash) => {
                let mut fields: Vec<_> = hash.into_iter().collect();
                fields.sort();
                format!("{} => {:?}", key, fields)
            }
            None => {
                let members: Vec<_> = store
                    .range(&key)
                    .into_iter()
                    .map(|m| (store.score(&key, &m), m))
                    .collect();
                format!("{} => {:?}", key, members)
            }
        })
        .collect()
}
