//! Comment endpoints: threads under a video, replies and comment reactions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Serialize;
use vidshare_common::AppResult;
use vidshare_core::{CommentInput, CommentWithAuthor, Page, ReactionSummary};
use vidshare_db::{entities::reaction::ReactionKind, repositories::ReactionTarget};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Comment response. Replies nest one level deep.
#[derive(Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub video_id: String,
    pub parent_id: Option<String>,
    pub user_id: String,
    pub username: String,
    pub profile_picture: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub likes: i32,
    pub dislikes: i32,
    pub liked: bool,
    pub disliked: bool,
    pub replies: Vec<CommentResponse>,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(c: CommentWithAuthor) -> Self {
        Self {
            id: c.comment.id,
            video_id: c.comment.video_id,
            parent_id: c.comment.parent_id,
            user_id: c.comment.user_id,
            username: c.author.username,
            profile_picture: c.author.profile_picture,
            content: c.comment.content,
            created_at: c.comment.created_at.to_rfc3339(),
            updated_at: c.comment.updated_at.map(|t| t.to_rfc3339()),
            likes: c.comment.likes_count,
            dislikes: c.comment.dislikes_count,
            liked: c.viewer_state.liked(),
            disliked: c.viewer_state.disliked(),
            replies: c.replies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Top-level comments of a video, newest first, with their replies.
async fn list(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state
        .comment_service
        .list_comments(viewer.id(), &video_id, page)
        .await?;
    Ok(ApiResponse::ok(comments.into_iter().map(Into::into).collect()))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .post_comment(&user.id, &video_id, input)
        .await?;
    Ok(ApiResponse::created(comment.into()))
}

async fn reply(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .post_reply(&user.id, &parent_id, input)
        .await?;
    Ok(ApiResponse::created(comment.into()))
}

async fn edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .edit_comment(&user.id, &id, input)
        .await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.comment_service.delete_comment(&user.id, &id).await?;
    Ok(no_content())
}

async fn like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReactionSummary>> {
    let summary = state
        .reaction_service
        .set_reaction(&user.id, &ReactionTarget::comment(id), ReactionKind::Like)
        .await?;
    Ok(ApiResponse::ok(summary))
}

async fn dislike(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReactionSummary>> {
    let summary = state
        .reaction_service
        .set_reaction(&user.id, &ReactionTarget::comment(id), ReactionKind::Dislike)
        .await?;
    Ok(ApiResponse::ok(summary))
}

async fn clear_reaction(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReactionSummary>> {
    let summary = state
        .reaction_service
        .clear_reaction(&user.id, &ReactionTarget::comment(id))
        .await?;
    Ok(ApiResponse::ok(summary))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos/{id}/comments", get(list).post(create))
        .route("/comments/{id}", put(edit).delete(remove))
        .route("/comments/{id}/replies", post(reply))
        .route("/comments/{id}/like", post(like))
        .route("/comments/{id}/dislike", post(dislike))
        .route("/comments/{id}/reaction", delete(clear_reaction))
}
