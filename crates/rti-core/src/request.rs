//! The RTI request record and its list-view summary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentMeta;
use crate::validate::ValidationError;

/// Lifecycle status of an RTI request.
///
/// Stored and serialised as its capitalised name (`"Pending"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Responded,
    Verified,
    Rejected,
    Refunded,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::Responded,
        Status::Verified,
        Status::Rejected,
        Status::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Responded => "Responded",
            Status::Verified => "Verified",
            Status::Rejected => "Rejected",
            Status::Refunded => "Refunded",
        }
    }

    /// Verified (funds released) and Refunded (funds returned) end the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Verified | Status::Refunded)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

/// A stored RTI request. File bytes live in the attachment store, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtiRequest {
    pub id: i64,
    pub citizen_address: String,
    pub title: String,
    pub description: String,
    pub attachment: Option<AttachmentMeta>,
    /// Bounty in ether.
    pub bounty: f64,
    pub deadline: DateTime<Utc>,
    pub status: Status,
    pub response_text: Option<String>,
    pub officer_address: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Identifier assigned by the contract. Write-once.
    pub blockchain_id: Option<u64>,
    /// False when a local write was kept after the matching on-chain call failed.
    pub chain_synced: bool,
    pub sync_error: Option<String>,
}

impl RtiRequest {
    pub fn has_file(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn summary(&self) -> RtiSummary {
        RtiSummary::from(self)
    }
}

/// List-view projection of a request, without response details or file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtiSummary {
    pub id: i64,
    pub blockchain_id: Option<u64>,
    pub title: String,
    pub description: String,
    pub bounty: f64,
    pub deadline: DateTime<Utc>,
    pub status: Status,
    pub has_file: bool,
    pub created_at: DateTime<Utc>,
    pub chain_synced: bool,
}

impl From<&RtiRequest> for RtiSummary {
    fn from(rti: &RtiRequest) -> Self {
        Self {
            id: rti.id,
            blockchain_id: rti.blockchain_id,
            title: rti.title.clone(),
            description: rti.description.clone(),
            bounty: rti.bounty,
            deadline: rti.deadline,
            status: rti.status,
            has_file: rti.has_file(),
            created_at: rti.created_at,
            chain_synced: rti.chain_synced,
        }
    }
}
