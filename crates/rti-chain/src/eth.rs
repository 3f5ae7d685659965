//! ethers-rs client for the RTI contract on a JSON-RPC node.
//!
//! Transactions are sent with `eth_sendTransaction` from the caller-supplied
//! account, so the node must hold those accounts unlocked (Hardhat/Anvil dev
//! nodes do by default).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use ethers::abi::{Abi, RawLog, Token};
use ethers::contract::{Contract, ContractError};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Log, U256, U64};
use tracing::{info, warn};

use crate::gateway::{
    ContractGateway, CreateCall, Created, GatewayError, TxHash, ether_to_wei, parse_address,
};

const GAS_LIMIT: u64 = 1_000_000;

/// How often pending transactions are polled for a receipt. The ethers default
/// of 7s suits mainnet, not a dev node that mines on every transaction.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Events the contract may emit on create, carrying the new request id.
const CREATED_EVENTS: [&str; 2] = ["RequestCreated", "RTICreated"];

type Client = Provider<Http>;

pub struct EthGateway {
    contract: Contract<Client>,
}

impl EthGateway {
    /// Connect to `rpc_url`, check the node answers, and bind the contract at
    /// `contract_address` using the ABI in `abi_path`.
    pub async fn connect(
        rpc_url: &str,
        contract_address: &str,
        abi_path: &Path,
    ) -> anyhow::Result<Self> {
        let provider = provider(rpc_url)?;
        let chain_id = provider
            .get_chainid()
            .await
            .with_context(|| format!("failed to connect to Ethereum node at {rpc_url}"))?;

        let address: Address = contract_address
            .parse()
            .with_context(|| format!("invalid contract address {contract_address}"))?;
        let abi = load_abi(abi_path)?;

        let code = provider
            .get_code(address, None)
            .await
            .context("failed to read contract code")?;
        if code.is_empty() {
            warn!(%contract_address, "no contract code at address; calls will fail");
        }

        info!(%rpc_url, %chain_id, %contract_address, "connected to RTI contract");
        Ok(Self {
            contract: Contract::new(address, abi, Arc::new(provider)),
        })
    }

    /// Send a state-changing call and return its hash without waiting for a receipt.
    async fn transact<T: ethers::abi::Tokenize + Send>(
        &self,
        function: &str,
        args: T,
        from: Address,
    ) -> Result<TxHash, GatewayError> {
        let call = self
            .contract
            .method::<_, ()>(function, args)
            .map_err(|e| GatewayError::Contract(e.to_string()))?
            .from(from)
            .gas(GAS_LIMIT);
        let pending = call.send().await.map_err(contract_error)?;
        let tx_hash = TxHash::from(*pending);
        info!(function, %tx_hash, "transaction submitted");
        Ok(tx_hash)
    }

    async fn rti_count(&self) -> Result<U256, GatewayError> {
        self.contract
            .method::<_, U256>("getRTICount", ())
            .map_err(|e| GatewayError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(contract_error)
    }
}

#[async_trait]
impl ContractGateway for EthGateway {
    async fn create_request(&self, req: &CreateCall<'_>) -> Result<Created, GatewayError> {
        let from = parse_address("citizen", req.sender)?;
        let value = ether_to_wei(req.bounty)?;
        let deadline = U256::from(u64::try_from(req.deadline).unwrap_or_default());

        let call = self
            .contract
            .method::<_, ()>(
                "createRTI",
                (req.title.to_string(), req.description.to_string(), deadline),
            )
            .map_err(|e| GatewayError::Contract(e.to_string()))?
            .from(from)
            .value(value)
            .gas(GAS_LIMIT);
        let pending = call.send().await.map_err(contract_error)?;
        let tx_hash = TxHash::from(*pending);

        let receipt = pending
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?
            .ok_or_else(|| GatewayError::MissingReceipt(tx_hash.clone()))?;
        if receipt.status != Some(U64::from(1u64)) {
            return Err(GatewayError::Reverted(tx_hash));
        }

        let blockchain_id = match created_id(
            self.contract.abi(),
            self.contract.address(),
            &receipt.logs,
        ) {
            Some(id) => id,
            None => {
                // No create event in the ABI. Reading the count after the
                // receipt races with other creates landing in later blocks.
                warn!(%tx_hash, "no create event in receipt, falling back to getRTICount");
                let count = self.rti_count().await?;
                count
                    .checked_sub(U256::one())
                    .ok_or_else(|| GatewayError::Contract("RTI count is zero after create".into()))?
                    .low_u64()
            }
        };
        info!(%tx_hash, blockchain_id, "RTI created on-chain");
        Ok(Created {
            tx_hash,
            blockchain_id,
        })
    }

    async fn submit_response(
        &self,
        blockchain_id: u64,
        response_text: &str,
        officer: &str,
    ) -> Result<TxHash, GatewayError> {
        let from = parse_address("officer", officer)?;
        self.transact(
            "submitResponse",
            (U256::from(blockchain_id), response_text.to_string()),
            from,
        )
        .await
    }

    async fn verify_and_release(
        &self,
        blockchain_id: u64,
        admin: &str,
    ) -> Result<TxHash, GatewayError> {
        let from = parse_address("admin", admin)?;
        self.transact("verifyAndRelease", U256::from(blockchain_id), from)
            .await
    }

    async fn refund_bounty(&self, blockchain_id: u64, citizen: &str) -> Result<TxHash, GatewayError> {
        let from = parse_address("citizen", citizen)?;
        self.transact("refundBounty", U256::from(blockchain_id), from)
            .await
    }

    fn name(&self) -> &'static str {
        "ethereum"
    }
}

fn provider(rpc_url: &str) -> anyhow::Result<Client> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .with_context(|| format!("invalid RPC url {rpc_url}"))?;
    Ok(provider.interval(POLL_INTERVAL))
}

/// The request id from the contract's create event in a receipt's logs.
fn created_id(abi: &Abi, contract: Address, logs: &[Log]) -> Option<u64> {
    let event = CREATED_EVENTS.iter().find_map(|name| abi.event(name).ok())?;
    let signature = event.signature();
    logs.iter()
        .filter(|log| log.address == contract && log.topics.first() == Some(&signature))
        .find_map(|log| {
            let decoded = event
                .parse_log(RawLog {
                    topics: log.topics.clone(),
                    data: log.data.to_vec(),
                })
                .ok()?;
            decoded.params.into_iter().find_map(|param| match param.value {
                Token::Uint(id) => Some(id.low_u64()),
                _ => None,
            })
        })
}

fn contract_error(e: ContractError<Client>) -> GatewayError {
    match e {
        ContractError::ProviderError { e } => GatewayError::Unavailable(e.to_string()),
        other => GatewayError::Contract(other.to_string()),
    }
}

/// Load a contract ABI from either a Hardhat artifact (`{"abi": [...], ...}`)
/// or a bare ABI array.
pub fn load_abi(path: &Path) -> anyhow::Result<Abi> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading contract ABI {}", path.display()))?;
    parse_abi(&raw).with_context(|| format!("parsing contract ABI {}", path.display()))
}

fn parse_abi(raw: &str) -> anyhow::Result<Abi> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let abi = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| anyhow::anyhow!("artifact has no \"abi\" field"))?,
        array @ serde_json::Value::Array(_) => array,
        _ => anyhow::bail!("expected an ABI array or an artifact object"),
    };
    Ok(serde_json::from_value(abi)?)
}
