use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("RTI not found: {0}")]
    NotFound(i64),

    #[error("blockchain id already set for RTI {0}")]
    BlockchainIdAlreadySet(i64),

    #[error("invalid attachment handle: {0}")]
    InvalidHandle(String),

    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attachment metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
