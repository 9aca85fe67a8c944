//! Search and discovery endpoints. Only public videos are ever returned.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use vidshare_common::AppResult;
use vidshare_core::{DEFAULT_SEARCH_LIMIT, SearchQuery};

use super::videos::VideoResponse;
use crate::{middleware::AppState, response::ApiResponse};

/// `?limit=` for the discovery feeds.
#[derive(Debug, Deserialize)]
struct FeedQuery {
    #[serde(default = "default_limit")]
    limit: u64,
}

const fn default_limit() -> u64 {
    DEFAULT_SEARCH_LIMIT
}

async fn search_videos(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<VideoResponse>>> {
    let videos = state.search_service.search_videos(query).await?;
    Ok(ApiResponse::ok(videos.into_iter().map(Into::into).collect()))
}

/// Most viewed first.
async fn trending(
    State(state): State<AppState>,
    Query(feed): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<VideoResponse>>> {
    let videos = state.search_service.trending(feed.limit).await?;
    Ok(ApiResponse::ok(videos.into_iter().map(Into::into).collect()))
}

/// Newest first.
async fn latest(
    State(state): State<AppState>,
    Query(feed): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<VideoResponse>>> {
    let videos = state.search_service.latest(feed.limit).await?;
    Ok(ApiResponse::ok(videos.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search/videos", get(search_videos))
        .route("/search/trending", get(trending))
        .route("/search/latest", get(latest))
}
