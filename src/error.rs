use thiserror::Error;

// Errors raised while fetching, indexing or dispatching a single block
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("block {0} not found on ledger")]
    MissingBlock(u64),

    #[error("transaction {0} not found on ledger")]
    MissingTransaction(String),

    #[error("malformed quantity {0:?}")]
    Quantity(String),

    #[error("inconsistent ledger data: {0}")]
    Inconsistent(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("store error: {0}")]
    StoreUnavailable(String),

    #[error("invalid block number {0:?}")]
    InvalidBlockNumber(String),

    #[error("block {0:?} is not in the work queue")]
    NotQueued(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IndexerError {
    // Poison failures will never succeed on retry and are dead-lettered instead
    pub fn is_poison(&self) -> bool {
        matches!(self, IndexerError::InvalidBlockNumber(_))
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IndexerError::Timeout("ledger request")
        } else {
            IndexerError::Rpc(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

// Errors from decoding transfer call data; never fatal to a block
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("call data too short: expected {expected} chars, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("call data is not valid hex")]
    InvalidHex,

    #[error("address word has non-zero padding")]
    NonZeroPadding,
}
