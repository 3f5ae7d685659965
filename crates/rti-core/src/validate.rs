//! Input validation for request creation and officer/admin actions.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_FILE_NAME_LEN: usize = 100;
pub const MAX_CONTENT_TYPE_LEN: usize = 50;
pub const DEFAULT_DEADLINE_DAYS: i64 = 30;
pub const MAX_DEADLINE_DAYS: i64 = 3650;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown status: {0}")]
    UnknownStatus(String),
}

impl ValidationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Raw create-form fields as received from the client, before parsing.
#[derive(Debug, Clone, Default)]
pub struct CreateFields {
    pub citizen_address: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub bounty: Option<String>,
    pub deadline_days: Option<String>,
}

/// A validated request submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub citizen_address: String,
    pub title: String,
    pub description: String,
    /// Bounty in ether, strictly positive.
    pub bounty: f64,
    pub deadline_days: i64,
}

impl NewRequest {
    pub fn parse(fields: &CreateFields) -> Result<Self, ValidationError> {
        let citizen_address = required("citizen_address", fields.citizen_address.as_deref())?;
        let title = required("title", fields.title.as_deref())?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::invalid(
                "title",
                format!("longer than {MAX_TITLE_LEN} characters"),
            ));
        }
        let description = required("description", fields.description.as_deref())?;

        let bounty_raw = required("bounty", fields.bounty.as_deref())?;
        let bounty: f64 = bounty_raw
            .parse()
            .map_err(|_| ValidationError::invalid("bounty", format!("not a number: {bounty_raw}")))?;
        if !bounty.is_finite() || bounty <= 0.0 {
            return Err(ValidationError::invalid("bounty", "must be greater than zero"));
        }

        let deadline_days = match fields.deadline_days.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_DEADLINE_DAYS,
            Some(raw) => raw.parse().map_err(|_| {
                ValidationError::invalid("deadline_days", format!("not an integer: {raw}"))
            })?,
        };
        if !(0..=MAX_DEADLINE_DAYS).contains(&deadline_days) {
            return Err(ValidationError::invalid(
                "deadline_days",
                format!("must be between 0 and {MAX_DEADLINE_DAYS}"),
            ));
        }

        Ok(Self {
            citizen_address,
            title,
            description,
            bounty,
            deadline_days,
        })
    }

    /// Deadline for a request submitted at `now`.
    pub fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.deadline_days)
    }
}

/// A trimmed, non-empty field value.
pub fn required(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::Missing(field)),
    }
}

/// Whether `s` looks like a 20-byte hex account address (`0x` + 40 hex digits).
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
