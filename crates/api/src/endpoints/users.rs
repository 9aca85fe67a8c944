//! User endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
};
use serde::Serialize;
use vidshare_common::AppResult;
use vidshare_core::{Page, UpdateUserInput};
use vidshare_db::entities::user;

use super::videos::{VideoResponse, read_file_part};
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Public user profile.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            profile_picture: u.profile_picture,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// The authenticated caller.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

/// Rename the caller.
async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.update(&user.id, input).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Replace the caller's avatar from a `profile_picture` multipart part.
async fn upload_profile_picture(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<UserResponse>> {
    let picture = read_file_part(&mut multipart, "profile_picture").await?;
    let user = state
        .user_service
        .set_profile_picture(&user.id, picture)
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.get(&id).await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn show_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.get_by_username(&username).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// A user's uploads. Their private videos are listed only to themself.
async fn videos(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<Vec<VideoResponse>>> {
    let videos = state
        .video_service
        .list_by_user(viewer.id(), &id, page)
        .await?;
    Ok(ApiResponse::ok(videos.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).put(update_me))
        .route("/users/me/profile-picture", post(upload_profile_picture))
        .route("/users/by-username/{username}", get(show_by_username))
        .route("/users/{id}", get(show))
        .route("/users/{id}/videos", get(videos))
}
