//! In-process stand-in for the RTI contract.
//!
//! Keeps the same bookkeeping the contract does (sequential ids, per-request
//! state, requester-only refunds) and records every call. A failure can be
//! injected to exercise the node-unavailable paths.

use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use tracing::info;

use crate::gateway::{
    ContractGateway, CreateCall, Created, GatewayError, TxHash, ether_to_wei, parse_address,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnChainState {
    Pending,
    Responded,
    Verified,
    Refunded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnChainRequest {
    pub requester: Address,
    pub title: String,
    pub deadline: i64,
    pub bounty_wei: U256,
    pub response: Option<String>,
    pub state: OnChainState,
}

/// A call as seen by the gateway, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create { title: String, sender: String, bounty: f64 },
    Respond { blockchain_id: u64, officer: String },
    Verify { blockchain_id: u64, admin: String },
    Refund { blockchain_id: u64, citizen: String },
}

#[derive(Default)]
struct ChainState {
    requests: Vec<OnChainRequest>,
    calls: Vec<GatewayCall>,
    failure: Option<String>,
    tx_count: u64,
}

impl ChainState {
    fn check_available(&self) -> Result<(), GatewayError> {
        match &self.failure {
            Some(reason) => Err(GatewayError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn next_tx(&mut self) -> TxHash {
        self.tx_count += 1;
        TxHash(format!("0x{:064x}", self.tx_count))
    }

    fn request_mut(&mut self, blockchain_id: u64) -> Result<&mut OnChainRequest, GatewayError> {
        usize::try_from(blockchain_id)
            .ok()
            .and_then(|idx| self.requests.get_mut(idx))
            .ok_or_else(|| GatewayError::Contract(format!("RTI {blockchain_id} does not exist")))
    }
}

#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<ChainState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail as if the node were down.
    pub fn fail_with(&self, reason: &str) {
        self.lock().failure = Some(reason.to_string());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn request(&self, blockchain_id: u64) -> Option<OnChainRequest> {
        usize::try_from(blockchain_id)
            .ok()
            .and_then(|idx| self.lock().requests.get(idx).cloned())
    }

    /// Equivalent of the contract's `getRTICount`.
    pub fn rti_count(&self) -> u64 {
        self.lock().requests.len() as u64
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        // Poisoning only follows a panic in another test thread; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ContractGateway for InMemoryGateway {
    async fn create_request(&self, req: &CreateCall<'_>) -> Result<Created, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Create {
            title: req.title.to_string(),
            sender: req.sender.to_string(),
            bounty: req.bounty,
        });
        state.check_available()?;
        let requester = parse_address("citizen", req.sender)?;
        let bounty_wei = ether_to_wei(req.bounty)?;

        state.requests.push(OnChainRequest {
            requester,
            title: req.title.to_string(),
            deadline: req.deadline,
            bounty_wei,
            response: None,
            state: OnChainState::Pending,
        });
        let blockchain_id = state.requests.len() as u64 - 1;
        let tx_hash = state.next_tx();
        info!(%tx_hash, blockchain_id, "in-memory RTI created");
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
        let mut state = self.lock();
        state.calls.push(GatewayCall::Respond {
            blockchain_id,
            officer: officer.to_string(),
        });
        state.check_available()?;
        parse_address("officer", officer)?;

        let request = state.request_mut(blockchain_id)?;
        if request.state != OnChainState::Pending {
            return Err(GatewayError::Contract("RTI is not pending".into()));
        }
        request.response = Some(response_text.to_string());
        request.state = OnChainState::Responded;
        Ok(state.next_tx())
    }

    async fn verify_and_release(
        &self,
        blockchain_id: u64,
        admin: &str,
    ) -> Result<TxHash, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Verify {
            blockchain_id,
            admin: admin.to_string(),
        });
        state.check_available()?;
        parse_address("admin", admin)?;

        let request = state.request_mut(blockchain_id)?;
        if request.state != OnChainState::Responded {
            return Err(GatewayError::Contract("RTI has no response to verify".into()));
        }
        request.state = OnChainState::Verified;
        Ok(state.next_tx())
    }

    async fn refund_bounty(&self, blockchain_id: u64, citizen: &str) -> Result<TxHash, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Refund {
            blockchain_id,
            citizen: citizen.to_string(),
        });
        state.check_available()?;
        let sender = parse_address("citizen", citizen)?;

        let request = state.request_mut(blockchain_id)?;
        if request.requester != sender {
            return Err(GatewayError::Contract("only the requester can be refunded".into()));
        }
        if request.state != OnChainState::Pending {
            return Err(GatewayError::Contract("RTI is not refundable".into()));
        }
        request.state = OnChainState::Refunded;
        Ok(state.next_tx())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
