use std::fmt;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid bounty amount: {0}")]
    InvalidAmount(String),

    #[error("request is not registered on-chain")]
    NotOnChain,

    #[error("blockchain node unavailable: {0}")]
    Unavailable(String),

    #[error("contract call failed: {0}")]
    Contract(String),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("no receipt for transaction {0}")]
    MissingReceipt(TxHash),
}

/// A `0x`-prefixed transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ethers::types::H256> for TxHash {
    fn from(hash: ethers::types::H256) -> Self {
        Self(format!("{hash:#x}"))
    }
}

/// Arguments of the contract's `createRTI` call.
#[derive(Debug, Clone)]
pub struct CreateCall<'a> {
    pub title: &'a str,
    pub description: &'a str,
    /// Deadline as Unix seconds.
    pub deadline: i64,
    /// Bounty in ether, sent as the transaction value.
    pub bounty: f64,
    pub sender: &'a str,
}

/// Outcome of a confirmed `createRTI` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub tx_hash: TxHash,
    pub blockchain_id: u64,
}

/// The on-chain half of every lifecycle action.
///
/// Each call either returns the hash of a submitted transaction or fails;
/// there is no partial result. Only `create_request` waits for its receipt.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn create_request(&self, call: &CreateCall<'_>) -> Result<Created, GatewayError>;

    async fn submit_response(
        &self,
        blockchain_id: u64,
        response_text: &str,
        officer: &str,
    ) -> Result<TxHash, GatewayError>;

    async fn verify_and_release(&self, blockchain_id: u64, admin: &str)
    -> Result<TxHash, GatewayError>;

    async fn refund_bounty(&self, blockchain_id: u64, citizen: &str)
    -> Result<TxHash, GatewayError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

pub fn parse_address(field: &'static str, value: &str) -> Result<Address, GatewayError> {
    let invalid = || GatewayError::InvalidAddress {
        field,
        value: value.to_string(),
    };
    if !rti_core::validate::is_address(value) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

pub fn ether_to_wei(ether: f64) -> Result<U256, GatewayError> {
    if !ether.is_finite() || ether <= 0.0 {
        return Err(GatewayError::InvalidAmount(ether.to_string()));
    }
    ethers::utils::parse_ether(ether).map_err(|e| GatewayError::InvalidAmount(e.to_string()))
}
