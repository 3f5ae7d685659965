use std::sync::Arc;

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use rti_chain::ContractGateway;
use rti_store::{AttachmentStore, RtiStore};

/// Shared handles every handler receives through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RtiStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub gateway: Arc<dyn ContractGateway>,
}

impl AppState {
    pub fn new(
        store: Arc<RtiStore>,
        attachments: Arc<dyn AttachmentStore>,
        gateway: Arc<dyn ContractGateway>,
    ) -> Self {
        Self {
            store,
            attachments,
            gateway,
        }
    }
}

/// Router-level settings that do not belong to any one handler.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_upload_bytes: usize,
    pub cors_origin: Option<HeaderValue>,
}

impl ServerConfig {
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

    pub fn new(max_upload_bytes: usize) -> Self {
        Self {
            max_upload_bytes,
            cors_origin: None,
        }
    }

    pub fn with_cors_origin(mut self, origin: &str) -> Result<Self, InvalidHeaderValue> {
        self.cors_origin = Some(HeaderValue::from_str(origin)?);
        Ok(self)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_UPLOAD_BYTES)
    }
}
