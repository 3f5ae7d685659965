use async_trait::async_trait;
use rti_core::{AttachmentMeta, NewAttachment, StoredAttachment};

use crate::StoreError;

/// Storage for uploaded files, addressed by an opaque handle.
///
/// Implementations: [`BlobAttachments`](crate::BlobAttachments) keeps bytes in the
/// DuckDB database, [`DiskAttachments`](crate::DiskAttachments) writes one file per
/// upload into a directory.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store the bytes and return the metadata to keep on the request row.
    async fn put(&self, file: NewAttachment) -> Result<AttachmentMeta, StoreError>;

    /// Fetch bytes and metadata. `Ok(None)` for an unknown handle.
    async fn get(&self, handle: &str) -> Result<Option<StoredAttachment>, StoreError>;

    /// Delete an attachment. Removing an unknown handle is not an error.
    async fn remove(&self, handle: &str) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Handles are generated by the stores themselves; reject anything that could
/// escape a directory or collide with sidecar files.
pub(crate) fn check_handle(handle: &str) -> Result<(), StoreError> {
    let ok = !handle.is_empty()
        && handle.len() <= 64
        && !handle.starts_with('.')
        && !handle.ends_with(".meta.json")
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidHandle(handle.to_string()))
    }
}

pub(crate) fn new_handle(extension: Option<&str>) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    match extension.filter(|ext| ext.len() <= 16) {
        Some(ext) => format!("{id}.{ext}"),
        None => id,
    }
}
