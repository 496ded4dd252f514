use serde::Deserialize;

// Block as returned by eth_getBlockByNumber; quantities are 0x-prefixed hex
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub miner: Option<String>,
    pub gas_used: String,
    #[serde(default)]
    pub size: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
}

// Nodes return either bare hashes or full objects depending on the request flag
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockTransaction {
    Hash(String),
    Full(RpcTransaction),
}

impl BlockTransaction {
    pub fn hash(&self) -> &str {
        match self {
            BlockTransaction::Hash(hash) => hash,
            BlockTransaction::Full(tx) => &tx.hash,
        }
    }
}

// Transaction as returned by eth_getTransactionByHash
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
    // Null for contract creation
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    pub gas_price: Option<String>,
    pub nonce: String,
    pub block_number: Option<String>,
    #[serde(default)]
    pub input: String,
}

impl RpcTransaction {
    pub fn to_address(&self) -> &str {
        self.to.as_deref().unwrap_or("")
    }
}

// Stored under block:<number>:detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub hash: String,
    pub validator: String,
    pub gas_used: String,
    pub size: String,
    pub timestamp: String,
    pub number: String,
}

impl BlockRecord {
    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("hash".to_string(), self.hash.clone()),
            ("validator".to_string(), self.validator.clone()),
            ("gasUsed".to_string(), self.gas_used.clone()),
            ("size".to_string(), self.size.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
            ("number".to_string(), self.number.clone()),
        ]
    }
}

// Stored under block_tx:<blockNumber>:<hash>:detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub hash: String,
    pub input: String,
    pub nonce: String,
    pub block_number: String,
}

impl TransactionRecord {
    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("from".to_string(), self.from.clone()),
            ("to".to_string(), self.to.clone()),
            ("value".to_string(), self.value.clone()),
            ("gas".to_string(), self.gas.clone()),
            ("gasPrice".to_string(), self.gas_price.clone()),
            ("hash".to_string(), self.hash.clone()),
            ("input".to_string(), self.input.clone()),
            ("nonce".to_string(), self.nonce.clone()),
            ("blockNumber".to_string(), self.block_number.clone()),
        ]
    }
}

// Outcome of a successfully committed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub tx_count: usize,
    pub token_transfers: usize,
}
