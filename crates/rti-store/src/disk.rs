//! On-disk attachment storage: one file per upload plus a JSON metadata sidecar.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rti_core::{AttachmentMeta, NewAttachment, StoredAttachment};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StoreError;
use crate::attachment::{AttachmentStore, check_handle, new_handle};

#[derive(Serialize, Deserialize)]
struct Sidecar {
    file_name: String,
    content_type: String,
}

/// Attachments written under a root directory, named by a generated handle
/// that keeps the upload's extension.
pub struct DiskAttachments {
    root: PathBuf,
}

impl DiskAttachments {
    /// Use `root` as the upload directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "attachment directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, handle: &str) -> PathBuf {
        self.root.join(handle)
    }

    fn sidecar_path(&self, handle: &str) -> PathBuf {
        self.root.join(format!("{handle}.meta.json"))
    }
}

#[async_trait]
impl AttachmentStore for DiskAttachments {
    async fn put(&self, file: NewAttachment) -> Result<AttachmentMeta, StoreError> {
        let handle = new_handle(file.extension());
        let sidecar = Sidecar {
            file_name: file.file_name,
            content_type: file.content_type,
        };
        tokio::fs::write(self.data_path(&handle), &file.data).await?;
        tokio::fs::write(self.sidecar_path(&handle), serde_json::to_vec(&sidecar)?).await?;
        debug!(%handle, bytes = file.data.len(), "stored attachment on disk");
        Ok(AttachmentMeta {
            handle,
            file_name: sidecar.file_name,
            content_type: sidecar.content_type,
        })
    }

    async fn get(&self, handle: &str) -> Result<Option<StoredAttachment>, StoreError> {
        check_handle(handle)?;
        let data = match tokio::fs::read(self.data_path(handle)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Files dropped in by hand have no sidecar; serve them under their handle.
        let sidecar = match tokio::fs::read(self.sidecar_path(handle)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Sidecar {
                file_name: handle.to_string(),
                content_type: "application/octet-stream".to_string(),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredAttachment {
            meta: AttachmentMeta {
                handle: handle.to_string(),
                file_name: sidecar.file_name,
                content_type: sidecar.content_type,
            },
            data,
        }))
    }

    async fn remove(&self, handle: &str) -> Result<(), StoreError> {
        check_handle(handle)?;
        for path in [self.data_path(handle), self.sidecar_path(handle)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "disk"
    }
}
