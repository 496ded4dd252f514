use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{IndexerError, Result};
use crate::models::{RpcBlock, RpcTransaction};
use crate::utils::to_quantity;

// Read-only view of the ledger needed by the block processor
#[async_trait]
pub trait LedgerClient: Send + Sync {
    // Block with its transactions included
    async fn get_block_by_number(&self, number: u64) -> Result<RpcBlock>;

    async fn get_transaction_by_hash(&self, hash: &str) -> Result<RpcTransaction>;

    // Checked at startup to confirm the node answers
    async fn client_version(&self) -> Result<String>;
}

// JSON-RPC 2.0 client over HTTP
pub struct JsonRpcLedger {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        info!("Using ledger RPC at {}", url);
        Ok(JsonRpcLedger {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    // Sends one request; a JSON null result is returned as None
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("RPC {} #{}", method, id);

        let response: Value = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(IndexerError::Rpc(format!("{} failed: {}", method, error)));
        }
        match response.get("result") {
            None | Some(Value::Null) => Ok(None),
            Some(result) => serde_json::from_value(result.clone())
                .map(Some)
                .map_err(|e| IndexerError::Rpc(format!("{} returned unexpected payload: {}", method, e))),
        }
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn get_block_by_number(&self, number: u64) -> Result<RpcBlock> {
        self.call("eth_getBlockByNumber", json!([to_quantity(number), true]))
            .await?
            .ok_or(IndexerError::MissingBlock(number))
    }

    async fn get_transaction_by_hash(&self, hash: &str) -> Result<RpcTransaction> {
        self.call("eth_getTransactionByHash", json!([hash]))
            .await?
            .ok_or_else(|| IndexerError::MissingTransaction(hash.to_string()))
    }

    async fn client_version(&self) -> Result<String> {
        let version: Option<String> = self.call("web3_clientVersion", json!([])).await?;
        Ok(version.unwrap_or_default())
    }
}
