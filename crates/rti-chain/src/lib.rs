//! Chain layer: the contract gateway trait, an ethers-rs client for a JSON-RPC
//! node, and an in-process contract for tests and offline runs.

mod eth;
mod gateway;
mod memory;

pub use eth::{EthGateway, load_abi};
pub use gateway::{
    ContractGateway, CreateCall, Created, GatewayError, TxHash, ether_to_wei, parse_address,
};
pub use memory::{GatewayCall, InMemoryGateway, OnChainRequest, OnChainState};
