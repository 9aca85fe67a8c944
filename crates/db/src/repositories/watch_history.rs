//! Watch history repository.

use std::sync::Arc;

use crate::entities::{WatchHistory, watch_history};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::OnConflict,
};
use vidshare_common::{AppError, AppResult};

/// Watch history repository for database operations.
#[derive(Clone)]
pub struct WatchHistoryRepository {
    db: Arc<DatabaseConnection>,
}

impl WatchHistoryRepository {
    /// Create a new watch history repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the resume position of a user on a video.
    pub async fn find(
        &self,
        user_id: &str,
        video_id: &str,
    ) -> AppResult<Option<watch_history::Model>> {
        WatchHistory::find()
            .filter(watch_history::Column::UserId.eq(user_id))
            .filter(watch_history::Column::VideoId.eq(video_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or overwrite the `(user, video)` row. Last write wins.
    pub async fn upsert(&self, model: watch_history::ActiveModel) -> AppResult<()> {
        WatchHistory::insert(model)
            .on_conflict(
                OnConflict::columns([
                    watch_history::Column::UserId,
                    watch_history::Column::VideoId,
                ])
                .update_columns([
                    watch_history::Column::Position,
                    watch_history::Column::Duration,
                    watch_history::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// A user's history, most recently watched first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<watch_history::Model>> {
        WatchHistory::find()
            .filter(watch_history::Column::UserId.eq(user_id))
            .order_by_desc(watch_history::Column::UpdatedAt)
            .order_by_desc(watch_history::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
