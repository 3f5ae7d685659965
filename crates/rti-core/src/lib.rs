pub mod attachment;
pub mod lifecycle;
pub mod request;
pub mod validate;

pub use attachment::{AttachmentMeta, NewAttachment, StoredAttachment, sanitize_filename};
pub use lifecycle::LifecycleError;
pub use request::{RtiRequest, RtiSummary, Status};
pub use validate::{CreateFields, NewRequest, ValidationError};
