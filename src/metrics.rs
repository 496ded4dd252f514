use actix_web::HttpResponse;
use prometheus::{
    register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram,
};

// Defines Prometheus metrics for monitoring the ingestion pipeline
lazy_static::lazy_static! {
    // Counter for blocks fully committed to the index
    pub static ref BLOCKS_INDEXED: Counter = register_counter!(
        "ethbus_blocks_indexed_total",
        "Total blocks indexed"
    ).unwrap();

    // Counter for the total number of transactions indexed
    pub static ref TXS_INDEXED: Counter = register_counter!(
        "ethbus_txs_indexed_total",
        "Total transactions indexed"
    ).unwrap();

    pub static ref TOKEN_TRANSFERS: Counter = register_counter!(
        "ethbus_token_transfers_total",
        "Total token transfer calls decoded"
    ).unwrap();

    // Counter for block attempts that left the block pending
    pub static ref BLOCK_FAILURES: Counter = register_counter!(
        "ethbus_block_failures_total",
        "Total block processing failures"
    ).unwrap();

    pub static ref BLOCKS_DEAD_LETTERED: Counter = register_counter!(
        "ethbus_blocks_dead_lettered_total",
        "Total queue members moved to the dead-letter set"
    ).unwrap();

    // Histogram for measuring block processing time in seconds
    pub static ref BLOCK_PROCESS_TIME: Histogram = register_histogram!(
        "ethbus_block_process_seconds",
        "Block processing time in seconds"
    ).unwrap();

    // Gauge for the pending backlog seen by the last dispatcher cycle
    pub static ref QUEUE_PENDING: Gauge = register_gauge!(
        "ethbus_queue_pending",
        "Pending blocks in the work queue"
    ).unwrap();
}

// Handles GET /metrics requests to expose Prometheus metrics
pub async fn metrics() -> HttpResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let encoded = encoder.encode_to_string(&metric_families).unwrap_or_default();
    HttpResponse::Ok().body(encoded)
}
