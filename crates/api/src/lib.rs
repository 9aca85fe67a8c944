//! HTTP API layer for vidshare.
//!
//! - **Endpoints**: videos, comments, reactions, users
//! - **Extractors**: bearer-token authentication
//! - **Middleware**: token resolution into request extensions
//!
//! Built on Axum 0.8. Handlers return [`vidshare_common::AppResult`], so
//! every failure renders as `{"error":{"code","message"}}`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
