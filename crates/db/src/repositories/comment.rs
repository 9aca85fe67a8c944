//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment, reaction::TargetType};
use crate::repositories::reaction::delete_for_targets;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use vidshare_common::{AppError, AppResult};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(id.to_string()))
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Top-level comments on a video, newest first.
    pub async fn find_top_level_by_video(
        &self,
        video_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::VideoId.eq(video_id))
            .filter(comment::Column::ParentId.is_null())
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replies to any of the given comments, oldest first.
    pub async fn find_replies(&self, parent_ids: &[String]) -> AppResult<Vec<comment::Model>> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }

        Comment::find()
            .filter(comment::Column::ParentId.is_in(parent_ids.to_vec()))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all comments (including replies) on a video.
    pub async fn count_by_video(&self, video_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::VideoId.eq(video_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a comment, its replies, and every reaction on any of them.
    pub async fn delete_with_replies(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut ids: Vec<String> = Comment::find()
            .select_only()
            .column(comment::Column::Id)
            .filter(comment::Column::ParentId.eq(id))
            .into_tuple()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        ids.push(id.to_string());

        delete_for_targets(&txn, TargetType::Comment, ids)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Comment::delete_many()
            .filter(comment::Column::ParentId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Comment::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::CommentNotFound(id.to_string()));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
