//! Video service: catalogue, playback counters and resume positions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::page::Page;
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;
use vidshare_common::{
    AppError, AppResult, IdGenerator, MediaKind, StorageBackend, generate_storage_key,
};
use vidshare_db::{
    entities::{video, watch_history},
    repositories::{UserRepository, VideoRepository, WatchHistoryRepository},
};

/// Private videos are only visible to their uploader.
pub fn ensure_can_view(video: &video::Model, viewer_id: Option<&str>) -> AppResult<()> {
    if video.is_private && viewer_id != Some(video.user_id.as_str()) {
        return Err(AppError::Forbidden("This video is private".to_string()));
    }
    Ok(())
}

/// Metadata for a new upload.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateVideoInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default)]
    pub is_private: bool,

    /// Length in seconds, if the client knows it.
    #[validate(range(min = 0))]
    #[serde(default)]
    pub duration: i32,
}

/// Partial update of a video's metadata.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateVideoInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    /// `Some(None)` clears the description.
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,

    pub is_private: Option<bool>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Periodic playback position report.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct ProgressInput {
    #[validate(range(min = 0))]
    pub position: i32,

    #[validate(range(min = 0))]
    pub duration: i32,
}

/// A watch history row joined with its video.
#[derive(Debug, Clone)]
pub struct WatchHistoryEntry {
    pub entry: watch_history::Model,
    pub video: video::Model,
}

/// Video service for business logic.
#[derive(Clone)]
pub struct VideoService {
    video_repo: VideoRepository,
    user_repo: UserRepository,
    watch_history_repo: WatchHistoryRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl VideoService {
    /// Create a new video service.
    #[must_use]
    pub fn new(
        video_repo: VideoRepository,
        user_repo: UserRepository,
        watch_history_repo: WatchHistoryRepository,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            video_repo,
            user_repo,
            watch_history_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store an uploaded video (and optional thumbnail) and create its row.
    pub async fn upload(
        &self,
        user_id: &str,
        input: CreateVideoInput,
        file: MediaUpload,
        thumbnail: Option<MediaUpload>,
    ) -> AppResult<video::Model> {
        input.validate()?;
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if file.data.is_empty() {
            return Err(AppError::BadRequest("Video file is empty".to_string()));
        }
        MediaKind::Video.check_content_type(&file.content_type)?;
        if let Some(ref thumb) = thumbnail {
            MediaKind::Thumbnail.check_content_type(&thumb.content_type)?;
        }

        let key = generate_storage_key(MediaKind::Video, user_id, &file.file_name);
        let stored = self
            .storage
            .upload(&key, &file.data, &file.content_type)
            .await?;

        let stored_thumb = match thumbnail {
            Some(thumb) => {
                let thumb_key =
                    generate_storage_key(MediaKind::Thumbnail, user_id, &thumb.file_name);
                match self
                    .storage
                    .upload(&thumb_key, &thumb.data, &thumb.content_type)
                    .await
                {
                    Ok(uploaded) => Some(uploaded),
                    Err(e) => {
                        self.discard(&stored.key).await;
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let model = video::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description.filter(|d| !d.trim().is_empty())),
            file_key: Set(stored.key.clone()),
            file_url: Set(stored.url.clone()),
            file_md5: Set(stored.md5.clone()),
            content_type: Set(stored.content_type.clone()),
            size: Set(stored.size as i64),
            thumbnail_key: Set(stored_thumb.as_ref().map(|t| t.key.clone())),
            thumbnail_url: Set(stored_thumb.as_ref().map(|t| t.url.clone())),
            duration: Set(input.duration),
            is_private: Set(input.is_private),
            views_count: Set(0),
            likes_count: Set(0),
            dislikes_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        match self.video_repo.create(model).await {
            Ok(video) => {
                tracing::info!(video_id = %video.id, user_id = %user_id, size = video.size, "Video uploaded");
                Ok(video)
            }
            Err(e) => {
                self.discard(&stored.key).await;
                if let Some(thumb) = stored_thumb {
                    self.discard(&thumb.key).await;
                }
                Err(e)
            }
        }
    }

    /// Get a video the viewer is allowed to see.
    pub async fn get(&self, viewer_id: Option<&str>, id: &str) -> AppResult<video::Model> {
        let video = self.video_repo.get_by_id(id).await?;
        ensure_can_view(&video, viewer_id)?;
        Ok(video)
    }

    /// Public videos, newest first.
    pub async fn list_public(&self, page: Page) -> AppResult<Vec<video::Model>> {
        let page = page.clamped();
        self.video_repo.find_public(page.limit, page.offset).await
    }

    /// A user's uploads. Private ones are included only for the user themself.
    pub async fn list_by_user(
        &self,
        viewer_id: Option<&str>,
        user_id: &str,
        page: Page,
    ) -> AppResult<Vec<video::Model>> {
        let owner = self.user_repo.get_by_id(user_id).await?;
        let page = page.clamped();
        let include_private = viewer_id == Some(owner.id.as_str());
        self.video_repo
            .find_by_user(&owner.id, include_private, page.limit, page.offset)
            .await
    }

    /// Update metadata. Uploader only.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        input: UpdateVideoInput,
    ) -> AppResult<video::Model> {
        input.validate()?;
        let video = self.video_repo.get_by_id(id).await?;

        if video.user_id != user_id {
            return Err(AppError::Forbidden("Not your video".to_string()));
        }

        let mut model: video::ActiveModel = video.into();

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::Validation("Title must not be empty".to_string()));
            }
            model.title = Set(title);
        }
        if let Some(description) = input.description {
            model.description = Set(description.filter(|d| !d.trim().is_empty()));
        }
        if let Some(is_private) = input.is_private {
            model.is_private = Set(is_private);
        }
        model.updated_at = Set(Some(Utc::now().into()));

        self.video_repo.update(model).await
    }

    /// Swap in a new thumbnail, dropping the old file. Uploader only.
    pub async fn replace_thumbnail(
        &self,
        user_id: &str,
        id: &str,
        thumbnail: MediaUpload,
    ) -> AppResult<video::Model> {
        let video = self.video_repo.get_by_id(id).await?;

        if video.user_id != user_id {
            return Err(AppError::Forbidden("Not your video".to_string()));
        }
        if thumbnail.data.is_empty() {
            return Err(AppError::BadRequest("Thumbnail file is empty".to_string()));
        }
        MediaKind::Thumbnail.check_content_type(&thumbnail.content_type)?;

        let key = generate_storage_key(MediaKind::Thumbnail, user_id, &thumbnail.file_name);
        let stored = self
            .storage
            .upload(&key, &thumbnail.data, &thumbnail.content_type)
            .await?;

        let old_key = video.thumbnail_key.clone();
        let mut model: video::ActiveModel = video.into();
        model.thumbnail_key = Set(Some(stored.key.clone()));
        model.thumbnail_url = Set(Some(stored.url.clone()));
        model.updated_at = Set(Some(Utc::now().into()));

        match self.video_repo.update(model).await {
            Ok(video) => {
                if let Some(old) = old_key {
                    self.discard(&old).await;
                }
                tracing::debug!(video_id = %video.id, "Thumbnail replaced");
                Ok(video)
            }
            Err(e) => {
                self.discard(&stored.key).await;
                Err(e)
            }
        }
    }

    /// Delete a video with everything attached to it. Uploader only.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        let video = self.video_repo.get_by_id(id).await?;

        if video.user_id != user_id {
            return Err(AppError::Forbidden("Not your video".to_string()));
        }

        self.video_repo.delete_cascade(id).await?;

        self.discard(&video.file_key).await;
        if let Some(ref key) = video.thumbnail_key {
            self.discard(key).await;
        }

        tracing::info!(video_id = %id, user_id = %user_id, "Video deleted");
        Ok(())
    }

    /// Count one playback start. No deduplication.
    pub async fn record_view(&self, user_id: &str, id: &str) -> AppResult<i64> {
        self.get(Some(user_id), id).await?;
        self.video_repo.increment_views_count(id).await
    }

    /// Store the user's resume position. Last write wins.
    pub async fn record_progress(
        &self,
        user_id: &str,
        id: &str,
        input: ProgressInput,
    ) -> AppResult<()> {
        input.validate()?;
        if input.duration > 0 && input.position > input.duration {
            return Err(AppError::Validation(format!(
                "Position {} is past the end of the video ({})",
                input.position, input.duration
            )));
        }

        self.get(Some(user_id), id).await?;

        let model = watch_history::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            video_id: Set(id.to_string()),
            position: Set(input.position),
            duration: Set(input.duration),
            updated_at: Set(Utc::now().into()),
        };

        self.watch_history_repo.upsert(model).await
    }

    /// Where the user left off on a video, if they have started it.
    pub async fn resume_position(&self, user_id: &str, id: &str) -> AppResult<Option<i32>> {
        Ok(self
            .watch_history_repo
            .find(user_id, id)
            .await?
            .map(|entry| entry.position))
    }

    /// "Continue watching": most recently watched first.
    ///
    /// Rows whose video has since gone private are skipped.
    pub async fn watch_history(
        &self,
        user_id: &str,
        page: Page,
    ) -> AppResult<Vec<WatchHistoryEntry>> {
        let page = page.clamped();
        let rows = self
            .watch_history_repo
            .find_by_user(user_id, page.limit, page.offset)
            .await?;

        let video_ids: Vec<String> = rows.iter().map(|r| r.video_id.clone()).collect();
        let mut videos: HashMap<String, video::Model> = self
            .video_repo
            .find_by_ids(&video_ids)
            .await?
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|entry| {
                let video = videos.remove(&entry.video_id)?;
                ensure_can_view(&video, Some(user_id)).ok()?;
                Some(WatchHistoryEntry { entry, video })
            })
            .collect())
    }

    /// Best-effort removal of a stored file.
    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(storage_key = %key, error = %e, "Failed to delete file from storage");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use vidshare_common::LocalStorage;

    fn create_test_video(id: &str, owner: &str, is_private: bool) -> video::Model {
        video::Model {
            id: id.to_string(),
            user_id: owner.to_string(),
            title: "Test".to_string(),
            description: None,
            file_key: "videos/a.mp4".to_string(),
            file_url: "/files/videos/a.mp4".to_string(),
            file_md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            content_type: "video/mp4".to_string(),
            size: 0,
            thumbnail_key: None,
            thumbnail_url: None,
            duration: 100,
            is_private,
            views_count: 0,
            likes_count: 0,
            dislikes_count: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service(db: sea_orm::DatabaseConnection) -> VideoService {
        let db = Arc::new(db);
        VideoService::new(
            VideoRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
            WatchHistoryRepository::new(db),
            Arc::new(LocalStorage::new(
                std::env::temp_dir().join("vidshare-unit"),
                "/files".to_string(),
            )),
        )
    }

    #[test]
    fn test_private_video_visibility() {
        let video = create_test_video("v1", "owner", true);
        assert!(ensure_can_view(&video, Some("owner")).is_ok());
        assert!(matches!(
            ensure_can_view(&video, Some("someone")),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_can_view(&video, None).is_err());

        let public = create_test_video("v2", "owner", false);
        assert!(ensure_can_view(&public, None).is_ok());
    }

    #[tokio::test]
    async fn test_record_progress_rejects_position_past_end() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let result = service(db)
            .record_progress(
                "u1",
                "v1",
                ProgressInput {
                    position: 120,
                    duration: 100,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_record_progress_rejects_negative_position() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let result = service(db)
            .record_progress(
                "u1",
                "v1",
                ProgressInput {
                    position: -1,
                    duration: 0,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_video("v1", "owner", false)]])
            .into_connection();

        let result = service(db)
            .update(
                "intruder",
                "v1",
                UpdateVideoInput {
                    title: Some("mine now".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_replace_thumbnail_by_non_owner_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_video("v1", "owner", false)]])
            .into_connection();

        let result = service(db)
            .replace_thumbnail(
                "intruder",
                "v1",
                MediaUpload {
                    file_name: "t.png".to_string(),
                    content_type: "image/png".to_string(),
                    data: vec![1],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_replace_thumbnail_rejects_non_image() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_video("v1", "owner", false)]])
            .into_connection();

        let result = service(db)
            .replace_thumbnail(
                "owner",
                "v1",
                MediaUpload {
                    file_name: "t.mp4".to_string(),
                    content_type: "video/mp4".to_string(),
                    data: vec![1],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_video_content_type() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let result = service(db)
            .upload(
                "u1",
                CreateVideoInput {
                    title: "Cat".to_string(),
                    ..Default::default()
                },
                MediaUpload {
                    file_name: "cat.png".to_string(),
                    content_type: "image/png".to_string(),
                    data: vec![1, 2, 3],
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
