pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod models;
pub mod utils;

pub use config::Config;
pub use error::{IndexerError, Result};
pub use models::{BlockRecord, BlockSummary, TransactionRecord};
