pub mod classifier;
pub mod dispatcher;
pub mod fetcher;
pub mod indexer;

pub use classifier::{classify, TokenTransfer, TxKind};
pub use dispatcher::{handle_block, BlockOutcome, Cycle, Dispatcher, WorkerPool};
pub use fetcher::{JsonRpcLedger, LedgerClient};
pub use indexer::{build_batch, BlockProcessor};
