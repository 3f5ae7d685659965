//! HTTP surface: axum router, request handlers, and the lifecycle service that
//! sequences record-store writes with contract-gateway calls.

mod error;
pub mod lifecycle;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, ServerConfig};
