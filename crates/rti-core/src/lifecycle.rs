//! Status transition rules.
//!
//! ```text
//! Pending ──respond──▶ Responded ──verify──▶ Verified
//!    │                    │
//!    └──reject (local)────┴──▶ Rejected
//! Pending | Rejected ──refund (deadline passed)──▶ Refunded
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::request::{RtiRequest, Status};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("RTI not in Responded state")]
    NotResponded,

    #[error("Cannot refund this RTI")]
    NotRefundable,

    #[error("Deadline not yet passed")]
    DeadlineNotPassed,

    #[error("RTI is already {0}")]
    Terminal(Status),

    #[error("RTI is {0}; only Pending requests can be responded to")]
    NotPending(Status),

    #[error("status cannot change from {from} to {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("a rejection reason is required")]
    MissingRejectionReason,

    #[error("RTI is already in sync with the chain")]
    AlreadySynced,
}

impl RtiRequest {
    /// An officer may respond to a Pending request, or replace a local
    /// response the chain never accepted (the on-chain request is still pending).
    pub fn ensure_respondable(&self) -> Result<(), LifecycleError> {
        match self.status {
            Status::Pending => Ok(()),
            Status::Responded if !self.chain_synced => Ok(()),
            status if status.is_terminal() => Err(LifecycleError::Terminal(status)),
            status => Err(LifecycleError::NotPending(status)),
        }
    }

    pub fn ensure_verifiable(&self) -> Result<(), LifecycleError> {
        if self.status != Status::Responded {
            return Err(LifecycleError::NotResponded);
        }
        Ok(())
    }

    /// Refunds need a Pending or Rejected request whose deadline is at or before `now`.
    pub fn ensure_refundable(&self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if !matches!(self.status, Status::Pending | Status::Rejected) {
            return Err(LifecycleError::NotRefundable);
        }
        if now < self.deadline {
            return Err(LifecycleError::DeadlineNotPassed);
        }
        Ok(())
    }

    /// Only a Responded request whose on-chain response failed can be resubmitted.
    pub fn ensure_resyncable(&self) -> Result<(), LifecycleError> {
        if self.chain_synced {
            return Err(LifecycleError::AlreadySynced);
        }
        if self.status != Status::Responded {
            return Err(LifecycleError::NotResponded);
        }
        Ok(())
    }

    /// Check a local-only edit. The single status change allowed off-chain is
    /// rejection of a Pending or Responded request, with a reason.
    pub fn ensure_editable(
        &self,
        new_status: Option<Status>,
        rejection_reason: Option<&str>,
    ) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::Terminal(self.status));
        }
        match new_status {
            None => Ok(()),
            Some(to) if to == self.status => Ok(()),
            Some(Status::Rejected) => {
                if rejection_reason.is_none_or(|r| r.trim().is_empty()) {
                    return Err(LifecycleError::MissingRejectionReason);
                }
                Ok(())
            }
            Some(to) => Err(LifecycleError::IllegalTransition {
                from: self.status,
                to,
            }),
        }
    }
}
