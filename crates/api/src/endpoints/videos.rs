//! Video endpoints: catalogue, playback tracking and video reactions.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Serialize;
use vidshare_common::{AppError, AppResult};
use vidshare_core::{
    CreateVideoInput, MediaUpload, Page, ProgressInput, ReactionSummary, UpdateVideoInput,
    WatchHistoryEntry,
};
use vidshare_db::{
    entities::{reaction::ReactionKind, video::Model as VideoModel},
    repositories::ReactionTarget,
};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Video response.
#[derive(Serialize)]
pub struct VideoResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub duration: i32,
    pub is_private: bool,
    pub views: i64,
    pub likes: i32,
    pub dislikes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disliked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u64>,
    /// Where the caller left off, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_position: Option<i32>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<VideoModel> for VideoResponse {
    fn from(v: VideoModel) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            title: v.title,
            description: v.description,
            file_url: v.file_url,
            thumbnail_url: v.thumbnail_url,
            content_type: v.content_type,
            size: v.size,
            duration: v.duration,
            is_private: v.is_private,
            views: v.views_count,
            likes: v.likes_count,
            dislikes: v.dislikes_count,
            liked: None,
            disliked: None,
            comment_count: None,
            resume_position: None,
            created_at: v.created_at.to_rfc3339(),
            updated_at: v.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl VideoResponse {
    /// Live counters, plus the caller's own reaction when signed in.
    fn with_summary(mut self, summary: ReactionSummary, signed_in: bool) -> Self {
        self.likes = summary.likes;
        self.dislikes = summary.dislikes;
        if signed_in {
            self.liked = Some(summary.liked);
            self.disliked = Some(summary.disliked);
        }
        self
    }
}

/// View count after recording a view.
#[derive(Serialize)]
pub struct ViewsResponse {
    pub views: i64,
}

/// Watch history response.
#[derive(Serialize)]
pub struct WatchHistoryResponse {
    pub video_id: String,
    pub position: i32,
    pub duration: i32,
    pub updated_at: String,
    pub video: VideoResponse,
}

impl From<WatchHistoryEntry> for WatchHistoryResponse {
    fn from(e: WatchHistoryEntry) -> Self {
        Self {
            video_id: e.entry.video_id,
            position: e.entry.position,
            duration: e.entry.duration,
            updated_at: e.entry.updated_at.to_rfc3339(),
            video: e.video.into(),
        }
    }
}

async fn read_bytes(field: Field<'_>) -> AppResult<Vec<u8>> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec())
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn read_media(field: Field<'_>) -> AppResult<MediaUpload> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = read_bytes(field).await?;
    Ok(MediaUpload {
        file_name,
        content_type,
        data,
    })
}

/// The file part called `name`, ignoring every other part.
pub(super) async fn read_file_part(
    multipart: &mut Multipart,
    name: &str,
) -> AppResult<MediaUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(name) {
            return read_media(field).await;
        }
    }
    Err(AppError::BadRequest(format!("No {name} provided")))
}

/// Upload a video via multipart form.
async fn upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<VideoResponse>> {
    let mut video_file: Option<MediaUpload> = None;
    let mut thumbnail_file: Option<MediaUpload> = None;
    let mut input = CreateVideoInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "video_file" => video_file = Some(read_media(field).await?),
            "thumbnail_file" => {
                let thumb = read_media(field).await?;
                // Browsers send an empty part for an untouched file input.
                if !thumb.data.is_empty() {
                    thumbnail_file = Some(thumb);
                }
            }
            "title" => input.title = read_text(field).await?,
            "description" => {
                let text = read_text(field).await?;
                if !text.trim().is_empty() {
                    input.description = Some(text);
                }
            }
            "is_private" => {
                let text = read_text(field).await?;
                input.is_private = matches!(text.trim(), "true" | "1" | "on");
            }
            "duration" => {
                let text = read_text(field).await?;
                if !text.trim().is_empty() {
                    input.duration = text.trim().parse().map_err(|_| {
                        AppError::Validation(format!("Invalid duration: {text}"))
                    })?;
                }
            }
            _ => {}
        }
    }

    let file =
        video_file.ok_or_else(|| AppError::BadRequest("No video_file provided".to_string()))?;

    let video = state
        .video_service
        .upload(&user.id, input, file, thumbnail_file)
        .await?;

    Ok(ApiResponse::created(video.into()))
}

/// List public videos, newest first.
async fn list_public(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<Vec<VideoResponse>>> {
    let videos = state.video_service.list_public(page).await?;
    Ok(ApiResponse::ok(videos.into_iter().map(Into::into).collect()))
}

/// Get a video with its comment count. Signed-in callers also get their
/// reaction and resume position.
async fn show(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<VideoResponse>> {
    let video = state.video_service.get(viewer.id(), &id).await?;
    let summary = state
        .reaction_service
        .summary(viewer.id(), &ReactionTarget::video(&video.id))
        .await?;
    let comment_count = state
        .comment_service
        .count_comments(viewer.id(), &video.id)
        .await?;
    let resume_position = match viewer.id() {
        Some(viewer_id) => {
            state
                .video_service
                .resume_position(viewer_id, &video.id)
                .await?
        }
        None => None,
    };

    let mut response = VideoResponse::from(video).with_summary(summary, viewer.0.is_some());
    response.comment_count = Some(comment_count);
    response.resume_position = resume_position;
    Ok(ApiResponse::ok(response))
}

/// Update title, description or visibility.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateVideoInput>,
) -> AppResult<ApiResponse<VideoResponse>> {
    let video = state.video_service.update(&user.id, &id, input).await?;
    Ok(ApiResponse::ok(video.into()))
}

/// Replace the thumbnail from a `thumbnail_file` multipart part.
async fn replace_thumbnail(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<VideoResponse>> {
    let thumbnail = read_file_part(&mut multipart, "thumbnail_file").await?;
    let video = state
        .video_service
        .replace_thumbnail(&user.id, &id, thumbnail)
        .await?;
    Ok(ApiResponse::ok(video.into()))
}

/// Delete a video and everything attached to it.
async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.video_service.delete(&user.id, &id).await?;
    Ok(no_content())
}

/// Count a playback start.
async fn record_view(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ViewsResponse>> {
    let views = state.video_service.record_view(&user.id, &id).await?;
    Ok(ApiResponse::ok(ViewsResponse { views }))
}

/// Store the caller's playback position.
async fn record_progress(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProgressInput>,
) -> AppResult<StatusCode> {
    state
        .video_service
        .record_progress(&user.id, &id, input)
        .await?;
    Ok(no_content())
}

/// The caller's "continue watching" list.
async fn watch_history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<Vec<WatchHistoryResponse>>> {
    let entries = state.video_service.watch_history(&user.id, page).await?;
    Ok(ApiResponse::ok(entries.into_iter().map(Into::into).collect()))
}

async fn like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReactionSummary>> {
    let summary = state
        .reaction_service
        .set_reaction(&user.id, &ReactionTarget::video(id), ReactionKind::Like)
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
        .set_reaction(&user.id, &ReactionTarget::video(id), ReactionKind::Dislike)
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
        .clear_reaction(&user.id, &ReactionTarget::video(id))
        .await?;
    Ok(ApiResponse::ok(summary))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list_public).post(upload))
        .route("/videos/watch-history", get(watch_history))
        .route("/videos/{id}", get(show).put(update).delete(remove))
        .route("/videos/{id}/thumbnail", post(replace_thumbnail))
        .route("/videos/{id}/view", post(record_view))
        .route("/videos/{id}/progress", post(record_progress))
        .route("/videos/{id}/like", post(like))
        .route("/videos/{id}/dislike", post(dislike))
        .route("/videos/{id}/reaction", delete(clear_reaction))
}
