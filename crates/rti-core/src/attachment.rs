//! Attachment metadata and filename sanitising.

use serde::{Deserialize, Serialize};

use crate::validate::{MAX_CONTENT_TYPE_LEN, MAX_FILE_NAME_LEN};

const FALLBACK_FILE_NAME: &str = "upload";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Reference to a stored attachment, as kept on the request row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub handle: String,
    pub file_name: String,
    pub content_type: String,
}

/// An uploaded file on its way into an attachment store.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl NewAttachment {
    /// Build from raw upload parts: sanitises the name and bounds the content type.
    pub fn from_upload(raw_name: &str, content_type: Option<&str>, data: Vec<u8>) -> Self {
        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && ct.len() <= MAX_CONTENT_TYPE_LEN)
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        Self {
            file_name: sanitize_filename(raw_name),
            content_type: content_type.to_string(),
            data,
        }
    }

    /// Extension of the sanitised name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

/// An attachment read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub meta: AttachmentMeta,
    pub data: Vec<u8>,
}

/// Reduce a client-supplied filename to something safe to store and echo back.
///
/// Drops any directory part, keeps ASCII alphanumerics plus `.`, `-` and `_`,
/// turns whitespace into `_`, and trims leading dots and underscores.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    if trimmed.len() <= MAX_FILE_NAME_LEN {
        return trimmed.to_string();
    }
    // Keep the extension when truncating.
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < MAX_FILE_NAME_LEN / 2 => {
            let keep = MAX_FILE_NAME_LEN - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => trimmed[..MAX_FILE_NAME_LEN].to_string(),
    }
}
