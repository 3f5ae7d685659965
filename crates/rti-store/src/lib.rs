//! Storage layer: DuckDB-backed request records and pluggable attachment storage.

mod attachment;
mod disk;
mod duck;
mod error;

pub use attachment::AttachmentStore;
pub use disk::DiskAttachments;
pub use duck::{BlobAttachments, RtiStore, RtiUpdate, Session};
pub use error::StoreError;
