//! Lifecycle actions: each one pairs record-store writes with the matching
//! contract call.
//!
//! Ordering per action:
//! - create: insert row, call chain, store blockchain id. Any failure after
//!   the insert deletes the row and the attachment again.
//! - respond: write locally first. A failed chain call leaves the record
//!   Responded but flagged unsynced; `resync` retries it.
//! - verify / refund: call chain first, write locally only on success.

use chrono::Utc;
use rti_chain::{CreateCall, GatewayError, TxHash};
use rti_core::validate::required;
use rti_core::{
    AttachmentMeta, CreateFields, NewAttachment, NewRequest, RtiRequest, RtiSummary, Status,
    StoredAttachment,
};
use rti_store::{RtiUpdate, Session};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub rti_id: i64,
    pub blockchain_id: u64,
    pub tx_hash: TxHash,
}

/// Officer response to a request.
#[derive(Debug, Clone, Default)]
pub struct OfficerResponse {
    pub response_text: Option<String>,
    pub officer_address: Option<String>,
}

/// Local-only field edits. Never reaches the chain.
#[derive(Debug, Clone, Default)]
pub struct Edit {
    pub officer_address: Option<String>,
    pub response_text: Option<String>,
    pub status: Option<String>,
    pub rejection_reason: Option<String>,
}

pub fn list(state: &AppState) -> Result<Vec<RtiSummary>, ApiError> {
    Ok(state.store.session()?.list()?)
}

pub fn get(state: &AppState, id: i64) -> Result<RtiRequest, ApiError> {
    Ok(state.store.session()?.require(id)?)
}

pub async fn create(
    state: &AppState,
    fields: CreateFields,
    file: Option<NewAttachment>,
) -> Result<CreateOutcome, ApiError> {
    let request = NewRequest::parse(&fields)?;
    let attachment = match file {
        Some(file) => Some(state.attachments.put(file).await?),
        None => None,
    };

    let result = register(state, &request, attachment.as_ref()).await;
    if result.is_err() {
        if let Some(meta) = &attachment {
            if let Err(e) = state.attachments.remove(&meta.handle).await {
                warn!(handle = %meta.handle, error = %e, "failed to remove orphaned attachment");
            }
        }
    }
    result
}

async fn register(
    state: &AppState,
    request: &NewRequest,
    attachment: Option<&AttachmentMeta>,
) -> Result<CreateOutcome, ApiError> {
    let session = state.store.session()?;
    let rti = session.insert(request, attachment, Utc::now())?;

    let call = CreateCall {
        title: &rti.title,
        description: &rti.description,
        deadline: rti.deadline.timestamp(),
        bounty: rti.bounty,
        sender: &rti.citizen_address,
    };
    let created = match state.gateway.create_request(&call).await {
        Ok(created) => created,
        Err(e) => {
            roll_back(&session, rti.id, &e);
            return Err(e.into());
        }
    };
    if let Err(e) = session.set_blockchain_id(rti.id, created.blockchain_id) {
        roll_back(&session, rti.id, &e);
        return Err(e.into());
    }

    info!(
        id = rti.id,
        blockchain_id = created.blockchain_id,
        tx_hash = %created.tx_hash,
        gateway = state.gateway.name(),
        "RTI created"
    );
    Ok(CreateOutcome {
        rti_id: rti.id,
        blockchain_id: created.blockchain_id,
        tx_hash: created.tx_hash,
    })
}

fn roll_back(session: &Session, id: i64, cause: &dyn std::fmt::Display) {
    warn!(id, error = %cause, "create failed, removing local row");
    if let Err(e) = session.delete(id) {
        warn!(id, error = %e, "failed to remove row of failed create");
    }
}

pub async fn respond(
    state: &AppState,
    id: i64,
    response: OfficerResponse,
) -> Result<TxHash, ApiError> {
    let session = state.store.session()?;
    let rti = session.require(id)?;
    let response_text = required("response_text", response.response_text.as_deref())?;
    let officer = required("officer_address", response.officer_address.as_deref())?;
    rti.ensure_respondable()?;

    session.update(
        id,
        &RtiUpdate {
            status: Some(Status::Responded),
            response_text: Some(response_text.clone()),
            officer_address: Some(officer.clone()),
            ..RtiUpdate::default()
        },
    )?;

    let outcome = match rti.blockchain_id {
        Some(blockchain_id) => {
            state
                .gateway
                .submit_response(blockchain_id, &response_text, &officer)
                .await
        }
        None => Err(GatewayError::NotOnChain),
    };
    settle_response(&session, id, outcome)
}

/// Resubmit the stored response of a record whose earlier submission failed.
pub async fn resync(state: &AppState, id: i64) -> Result<TxHash, ApiError> {
    let session = state.store.session()?;
    let rti = session.require(id)?;
    rti.ensure_resyncable()?;

    let response_text = rti.response_text.unwrap_or_default();
    let officer = rti.officer_address.unwrap_or_default();
    let outcome = match rti.blockchain_id {
        Some(blockchain_id) => {
            state
                .gateway
                .submit_response(blockchain_id, &response_text, &officer)
                .await
        }
        None => Err(GatewayError::NotOnChain),
    };
    settle_response(&session, id, outcome)
}

fn settle_response(
    session: &Session,
    id: i64,
    outcome: Result<TxHash, GatewayError>,
) -> Result<TxHash, ApiError> {
    match outcome {
        Ok(tx_hash) => {
            session.mark_synced(id)?;
            info!(id, %tx_hash, "response submitted on-chain");
            Ok(tx_hash)
        }
        Err(e) => {
            session.mark_unsynced(id, &e.to_string())?;
            warn!(id, error = %e, "response kept locally, chain out of sync");
            Err(e.into())
        }
    }
}

pub async fn verify(state: &AppState, id: i64, admin: Option<&str>) -> Result<TxHash, ApiError> {
    let session = state.store.session()?;
    let rti = session.require(id)?;
    rti.ensure_verifiable()?;
    let admin = required("admin_address", admin)?;
    let blockchain_id = rti.blockchain_id.ok_or(GatewayError::NotOnChain)?;

    let tx_hash = state.gateway.verify_and_release(blockchain_id, &admin).await?;
    session.update(id, &RtiUpdate::status(Status::Verified))?;
    info!(id, %tx_hash, "RTI verified, bounty released");
    Ok(tx_hash)
}

pub async fn refund(state: &AppState, id: i64) -> Result<TxHash, ApiError> {
    let session = state.store.session()?;
    let rti = session.require(id)?;
    rti.ensure_refundable(Utc::now())?;
    let blockchain_id = rti.blockchain_id.ok_or(GatewayError::NotOnChain)?;

    let tx_hash = state
        .gateway
        .refund_bounty(blockchain_id, &rti.citizen_address)
        .await?;
    session.update(id, &RtiUpdate::status(Status::Refunded))?;
    info!(id, %tx_hash, "bounty refunded");
    Ok(tx_hash)
}

pub fn update(state: &AppState, id: i64, edit: Edit) -> Result<(), ApiError> {
    let session = state.store.session()?;
    let rti = session.require(id)?;
    let status = edit
        .status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()?;
    rti.ensure_editable(status, edit.rejection_reason.as_deref())?;

    let changes = RtiUpdate {
        status,
        response_text: edit.response_text,
        officer_address: edit.officer_address,
        rejection_reason: edit.rejection_reason,
    };
    if changes.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".into()));
    }
    session.update(id, &changes)?;
    info!(id, ?status, "RTI updated locally");
    Ok(())
}

/// The file attached to a request, if both the request and its bytes exist.
pub async fn attachment_of(state: &AppState, id: i64) -> Result<StoredAttachment, ApiError> {
    let file_not_found = || ApiError::NotFound("File not found");
    let meta = state
        .store
        .session()?
        .get(id)?
        .and_then(|rti| rti.attachment)
        .ok_or_else(file_not_found)?;
    let stored = state
        .attachments
        .get(&meta.handle)
        .await?
        .ok_or_else(file_not_found)?;
    Ok(StoredAttachment {
        meta,
        data: stored.data,
    })
}
