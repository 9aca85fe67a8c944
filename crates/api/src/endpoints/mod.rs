//! API endpoints.

mod comments;
mod search;
mod users;
mod videos;

use axum::Router;

use crate::middleware::AppState;

pub use comments::CommentResponse;
pub use users::UserResponse;
pub use videos::{VideoResponse, ViewsResponse, WatchHistoryResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(videos::router())
        .merge(comments::router())
        .merge(search::router())
        .merge(users::router())
}
